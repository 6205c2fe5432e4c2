//! The method tree exposed by the server binary.
//!
//! A small set of demonstration methods exercising every dispatch shape:
//! plain sync calls, defaults, a nested subtree, an asynchronous method,
//! and deliberately unreachable private entries.

use anyhow::anyhow;
use crosswire::{Fault, MethodDescriptor, MethodError, MethodTree, ParamSchema};
use serde_json::{json, Value};
use std::time::Duration;

pub fn demo_tree() -> MethodTree {
    let mut tree = MethodTree::new();

    tree.sync_method("add", ParamSchema::new().param("x").param("y"), |args| {
        let x = require_i64(args.get("x"), "x")?;
        let y = require_i64(args.get("y"), "y")?;
        Ok(json!(x + y))
    });

    tree.sync_method("ping", ParamSchema::new().param("data"), |args| {
        Ok(args.get("data").cloned().unwrap_or(Value::Null))
    });

    tree.sync_method("noargs", ParamSchema::new(), |_args| Ok(json!("Works!")));

    // Completes out-of-band from a spawned task.
    tree.async_method(
        "delayed_echo",
        ParamSchema::new()
            .param("data")
            .param_with_default("delay_ms", json!(10)),
        |args, completion| {
            let data = args.get("data").cloned().unwrap_or(Value::Null);
            let delay = args.get("delay_ms").and_then(Value::as_u64).unwrap_or(10);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                let _ = completion.complete(Ok(data));
            });
            Ok(())
        },
    );

    // Always fails; lets callers observe the sanitized internal error.
    tree.sync_method("fail", ParamSchema::new(), |_args| {
        Err(MethodError::Failed(anyhow!("Yar matey!")))
    });

    // Returns a handler-authored fault verbatim.
    tree.sync_method(
        "return_fault",
        ParamSchema::new().param("code").param("msg"),
        |args| {
            let code = require_i64(args.get("code"), "code")?;
            let msg = args
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Err(Fault {
                code: code as i32,
                message: msg,
            }
            .into())
        },
    );

    let mut math = MethodTree::new();
    math.sync_method(
        "power",
        ParamSchema::new()
            .param("base")
            .param("power")
            .param_with_default("modulo", Value::Null),
        |args| {
            let base = require_i64(args.get("base"), "base")?;
            let exponent = require_i64(args.get("power"), "power")?;
            if !(0..=i64::from(u32::MAX)).contains(&exponent) {
                return Err(MethodError::Failed(anyhow!("exponent out of range")));
            }
            match args.get("modulo").and_then(Value::as_i64) {
                Some(0) => Err(MethodError::Failed(anyhow!("modulo by zero"))),
                Some(modulo) => Ok(json!(mod_pow(base, exponent as u32, modulo))),
                None => base
                    .checked_pow(exponent as u32)
                    .map(|n| json!(n))
                    .ok_or_else(|| MethodError::Failed(anyhow!("overflow"))),
            }
        },
    );
    tree.subtree("tree", math);

    // Unreachable via RPC: hidden by descriptor, and by leading underscore.
    tree.register(
        "private",
        MethodDescriptor::sync(ParamSchema::new(), |_args| Ok(json!(false))).hidden(),
    );
    tree.sync_method("_private", ParamSchema::new(), |_args| Ok(json!(false)));

    tree
}

fn require_i64(value: Option<&Value>, name: &str) -> Result<i64, MethodError> {
    value
        .and_then(Value::as_i64)
        .ok_or_else(|| MethodError::Failed(anyhow!("parameter '{}' must be an integer", name)))
}

fn mod_pow(base: i64, exponent: u32, modulo: i64) -> i64 {
    let mut result: i64 = 1;
    let mut base = base.rem_euclid(modulo);
    for _ in 0..exponent {
        result = (result * base).rem_euclid(modulo);
    }
    result
}
