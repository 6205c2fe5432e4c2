//! Declared parameter schemas and argument binding.
//!
//! RPC-exposed methods declare their calling signature at registration time
//! (parameter names, defaults, variadic/catch-all acceptance) instead of
//! being introspected at call time. Binding validates call arguments
//! against that declaration and produces the exact argument set the method
//! runs with.

use crate::error::BindError;
use serde_json::{Map, Value};

/// One declared parameter: a name and an optional default.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    name: String,
    default: Option<Value>,
}

/// A method's declared calling signature.
#[derive(Debug, Clone, Default)]
pub struct ParamSchema {
    params: Vec<ParamSpec>,
    /// Extra positional arguments beyond the declared ones are accepted.
    variadic: bool,
    /// Keyword arguments that name no declared parameter are accepted.
    catch_all: bool,
}

impl ParamSchema {
    pub fn new() -> Self {
        ParamSchema::default()
    }

    /// Declare a required parameter.
    pub fn param(mut self, name: &str) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            default: None,
        });
        self
    }

    /// Declare a parameter with a default, bound when the caller omits it.
    pub fn param_with_default(mut self, name: &str, default: Value) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            default: Some(default),
        });
        self
    }

    /// Accept extra positional arguments beyond the declared parameters.
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Accept keyword arguments that name no declared parameter.
    pub fn catch_all(mut self) -> Self {
        self.catch_all = true;
        self
    }

    /// Bind call arguments to this signature.
    ///
    /// Exactly one calling convention may be used per call. Positional
    /// values bind left-to-right to declared parameters; keyword values
    /// must name a declared parameter unless the schema is catch-all.
    /// Declared defaults fill any parameter the caller left unbound, and a
    /// parameter still unbound after defaults is an error.
    pub fn bind(
        &self,
        positional: &[Value],
        keyword: &Map<String, Value>,
    ) -> Result<BoundArgs, BindError> {
        if !positional.is_empty() && !keyword.is_empty() {
            return Err(BindError::MixedArguments);
        }

        let mut named = Map::new();
        let mut extra = Vec::new();

        if !keyword.is_empty() {
            for (key, value) in keyword {
                let declared = self.params.iter().any(|p| p.name == *key);
                if !declared && !self.catch_all {
                    return Err(BindError::UnknownKeyword(key.clone()));
                }
                if named.contains_key(key) {
                    return Err(BindError::DuplicateKeyword(key.clone()));
                }
                named.insert(key.clone(), value.clone());
            }
        } else {
            for (position, value) in positional.iter().enumerate() {
                match self.params.get(position) {
                    Some(spec) => {
                        named.insert(spec.name.clone(), value.clone());
                    }
                    None if self.variadic => extra.push(value.clone()),
                    None => return Err(BindError::TooManyArguments),
                }
            }
        }

        for spec in &self.params {
            if !named.contains_key(&spec.name) {
                if let Some(default) = &spec.default {
                    named.insert(spec.name.clone(), default.clone());
                }
            }
        }

        for spec in &self.params {
            if !named.contains_key(&spec.name) {
                return Err(BindError::MissingArgument(spec.name.clone()));
            }
        }

        Ok(BoundArgs { named, extra })
    }
}

/// Arguments bound against a schema, ready to hand to a method.
#[derive(Debug, Clone, Default)]
pub struct BoundArgs {
    named: Map<String, Value>,
    extra: Vec<Value>,
}

impl BoundArgs {
    /// Look up a bound parameter by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    /// All bound parameters, by name.
    pub fn named(&self) -> &Map<String, Value> {
        &self.named
    }

    /// Extra positional arguments accepted by a variadic signature.
    pub fn extra(&self) -> &[Value] {
        &self.extra
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kwargs(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_positional_binding() {
        let schema = ParamSchema::new().param("x").param("y");
        let args = schema.bind(&[json!(5), json!(6)], &Map::new()).unwrap();
        assert_eq!(args.get("x"), Some(&json!(5)));
        assert_eq!(args.get("y"), Some(&json!(6)));
        assert!(args.extra().is_empty());
    }

    #[test]
    fn test_keyword_binding() {
        let schema = ParamSchema::new().param("x").param("y");
        let args = schema
            .bind(&[], &kwargs(&[("x", json!(1)), ("y", json!(2))]))
            .unwrap();
        assert_eq!(args.get("x"), Some(&json!(1)));
        assert_eq!(args.get("y"), Some(&json!(2)));
    }

    #[test]
    fn test_mixed_conventions_rejected() {
        let schema = ParamSchema::new().param("x").param("y");
        let err = schema
            .bind(&[json!(1)], &kwargs(&[("y", json!(2))]))
            .unwrap_err();
        assert_eq!(err, BindError::MixedArguments);
    }

    #[test]
    fn test_unknown_keyword_rejected() {
        let schema = ParamSchema::new().param("x");
        let err = schema
            .bind(&[], &kwargs(&[("z", json!(1))]))
            .unwrap_err();
        assert_eq!(err, BindError::UnknownKeyword("z".into()));
    }

    #[test]
    fn test_catch_all_accepts_unknown_keyword() {
        let schema = ParamSchema::new().param("x").catch_all();
        let args = schema
            .bind(&[], &kwargs(&[("x", json!(1)), ("z", json!(2))]))
            .unwrap();
        assert_eq!(args.get("z"), Some(&json!(2)));
    }

    #[test]
    fn test_too_many_positional_rejected() {
        let schema = ParamSchema::new().param("x");
        let err = schema.bind(&[json!(1), json!(2)], &Map::new()).unwrap_err();
        assert_eq!(err, BindError::TooManyArguments);
    }

    #[test]
    fn test_variadic_collects_extra_positional() {
        let schema = ParamSchema::new().param("x").variadic();
        let args = schema
            .bind(&[json!(1), json!(2), json!(3)], &Map::new())
            .unwrap();
        assert_eq!(args.get("x"), Some(&json!(1)));
        assert_eq!(args.extra(), &[json!(2), json!(3)]);
    }

    #[test]
    fn test_defaults_fill_unbound_parameters() {
        let schema = ParamSchema::new()
            .param("base")
            .param_with_default("power", json!(2));
        let args = schema.bind(&[json!(3)], &Map::new()).unwrap();
        assert_eq!(args.get("base"), Some(&json!(3)));
        assert_eq!(args.get("power"), Some(&json!(2)));
    }

    #[test]
    fn test_caller_value_wins_over_default() {
        let schema = ParamSchema::new()
            .param("base")
            .param_with_default("power", json!(2));
        let args = schema
            .bind(&[], &kwargs(&[("base", json!(3)), ("power", json!(5))]))
            .unwrap();
        assert_eq!(args.get("power"), Some(&json!(5)));
    }

    #[test]
    fn test_missing_required_rejected() {
        let schema = ParamSchema::new().param("x").param("y");
        let err = schema.bind(&[json!(1)], &Map::new()).unwrap_err();
        assert_eq!(err, BindError::MissingArgument("y".into()));
    }

    #[test]
    fn test_binding_is_faithful_recombination() {
        // Whatever convention the caller used, the bound set names every
        // supplied value exactly once.
        let schema = ParamSchema::new().param("a").param("b").param("c");
        let positional = schema
            .bind(&[json!(1), json!(2), json!(3)], &Map::new())
            .unwrap();
        let keyword = schema
            .bind(
                &[],
                &kwargs(&[("a", json!(1)), ("b", json!(2)), ("c", json!(3))]),
            )
            .unwrap();
        assert_eq!(positional.named(), keyword.named());
    }
}
