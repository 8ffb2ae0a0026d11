//! Demo handlers served by the `switchboard-rpc` binary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use switchboard_core::{capability, Registry, Result, RpcError};

capability! {
    /// Floating-point calculator.
    pub trait Calculator {
        fn add(&self, a: f64, b: f64) -> f64;
        fn subtract(&self, a: f64, b: f64) -> f64;
        fn divide(&self, a: f64, b: f64) -> f64;
        fn sum(&self, values: Vec<f64>) -> f64;
    }
}

capability! {
    /// String echo service.
    pub trait Echo {
        fn echo(&self, message: String) -> String;
        fn reverse(&self, message: String) -> String;
        fn ping(&self) -> String;
        fn calls(&self) -> u64 as "callCount";
    }
}

/// Stateless calculator.
#[derive(Debug, Default)]
pub struct BasicCalculator;

impl Calculator for BasicCalculator {
    fn add(&self, a: f64, b: f64) -> Result<f64> {
        Ok(a + b)
    }

    fn subtract(&self, a: f64, b: f64) -> Result<f64> {
        Ok(a - b)
    }

    fn divide(&self, a: f64, b: f64) -> Result<f64> {
        if b == 0.0 {
            return Err(RpcError::invocation("division by zero"));
        }
        Ok(a / b)
    }

    fn sum(&self, values: Vec<f64>) -> Result<f64> {
        Ok(values.iter().sum())
    }
}

/// Echo service counting the messages it has seen.
#[derive(Debug, Default)]
pub struct EchoService {
    calls: AtomicU64,
}

impl Echo for EchoService {
    fn echo(&self, message: String) -> Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(message)
    }

    fn reverse(&self, message: String) -> Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(message.chars().rev().collect())
    }

    fn ping(&self) -> Result<String> {
        Ok("pong".to_string())
    }

    fn calls(&self) -> Result<u64> {
        Ok(self.calls.load(Ordering::Relaxed))
    }
}

/// Registry with the demo handlers bound to `calc` and `echo`.
pub fn demo_registry() -> Result<Registry> {
    let mut registry = Registry::new();
    registry.register("calc", Arc::new(BasicCalculator), vec![Calculator::descriptor()])?;
    registry.register("echo", Arc::new(EchoService::default()), vec![Echo::descriptor()])?;
    Ok(registry)
}
