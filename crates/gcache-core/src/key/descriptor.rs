//! Key descriptor: how a registered function's call is bound into a
//! [`CacheKey`].

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::KeyConfig;
use crate::error::{CacheError, Result};

use super::canonical::{CacheKey, RESERVED_USE_CASE};

type IdFn<Args> = Arc<dyn Fn(&Args) -> std::result::Result<String, String> + Send + Sync>;
type ArgsFn<Args> =
    Arc<dyn Fn(&Args) -> std::result::Result<BTreeMap<String, String>, String> + Send + Sync>;

/// Binds a registered function's call arguments into a [`CacheKey`].
///
/// Rust has no runtime reflection over a function's parameter names, so
/// where the call's arguments are bound via `id_fn`/`args_fn` closures
/// supplied once at registration rather than inspected dynamically.
/// `ignore_args` has no separate mechanism: an argument is ignored simply
/// by `args_fn` not including it.
#[derive(Clone)]
pub struct KeyDescriptor<Args> {
    key_type: String,
    use_case: String,
    id_fn: IdFn<Args>,
    args_fn: ArgsFn<Args>,
    track_for_invalidation: bool,
    default_config: Option<KeyConfig>,
}

impl<Args> KeyDescriptor<Args> {
    pub fn builder(key_type: impl Into<String>, use_case: impl Into<String>) -> Builder<Args> {
        Builder {
            key_type: key_type.into(),
            use_case: use_case.into(),
            id_fn: None,
            args_fn: None,
            track_for_invalidation: true,
            default_config: None,
        }
    }

    pub fn key_type(&self) -> &str {
        &self.key_type
    }

    pub fn use_case(&self) -> &str {
        &self.use_case
    }

    pub fn track_for_invalidation(&self) -> bool {
        self.track_for_invalidation
    }

    pub fn default_config(&self) -> Option<&KeyConfig> {
        self.default_config.as_ref()
    }

    /// Builds the [`CacheKey`] for one call. A failure here (missing
    /// argument, an adapter erroring) is a `KeyBuild` error; the caller
    /// records `disabled{key_error}` and bypasses to the underlying
    /// function rather than propagating it.
    pub fn build_key(&self, args: &Args) -> Result<CacheKey> {
        let id = (self.id_fn)(args).map_err(CacheError::KeyBuild)?;
        let bound_args = (self.args_fn)(args).map_err(CacheError::KeyBuild)?;
        Ok(CacheKey::new(
            self.key_type.clone(),
            id,
            bound_args,
            self.use_case.clone(),
        ))
    }
}

pub struct Builder<Args> {
    key_type: String,
    use_case: String,
    id_fn: Option<IdFn<Args>>,
    args_fn: Option<ArgsFn<Args>>,
    track_for_invalidation: bool,
    default_config: Option<KeyConfig>,
}

impl<Args> Builder<Args> {
    pub fn id_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Args) -> std::result::Result<String, String> + Send + Sync + 'static,
    {
        self.id_fn = Some(Arc::new(f));
        self
    }

    pub fn args_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Args) -> std::result::Result<BTreeMap<String, String>, String> + Send + Sync + 'static,
    {
        self.args_fn = Some(Arc::new(f));
        self
    }

    pub fn track_for_invalidation(mut self, track: bool) -> Self {
        self.track_for_invalidation = track;
        self
    }

    pub fn default_config(mut self, config: KeyConfig) -> Self {
        self.default_config = Some(config);
        self
    }

    /// Finalizes the descriptor. Fails if `use_case` is the reserved
    /// `"watermark"` identifier, or if neither `id_fn` nor `args_fn` were
    /// supplied.
    pub fn build(self) -> Result<KeyDescriptor<Args>> {
        if self.use_case == RESERVED_USE_CASE {
            return Err(CacheError::ReservedUseCase);
        }
        let id_fn = self
            .id_fn
            .ok_or_else(|| CacheError::KeyBuild("descriptor is missing id_fn".to_string()))?;
        let args_fn = self
            .args_fn
            .unwrap_or_else(|| Arc::new(|_: &Args| Ok(BTreeMap::new())));
        Ok(KeyDescriptor {
            key_type: self.key_type,
            use_case: self.use_case,
            id_fn,
            args_fn,
            track_for_invalidation: self.track_for_invalidation,
            default_config: self.default_config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CallArgs {
        user_id: String,
        email: String,
    }

    #[test]
    fn builds_canonical_key_from_closures() {
        let descriptor = KeyDescriptor::builder("user_id", "profile")
            .id_fn(|a: &CallArgs| Ok(a.user_id.clone()))
            .args_fn(|a: &CallArgs| {
                let mut m = BTreeMap::new();
                m.insert("email".to_string(), a.email.clone());
                Ok(m)
            })
            .build()
            .unwrap();

        let key = descriptor
            .build_key(&CallArgs {
                user_id: "u1".to_string(),
                email: "a@x".to_string(),
            })
            .unwrap();
        assert_eq!(key.canonical("p"), "urn:p:user_id:u1?email=a%40x#profile");
    }

    #[test]
    fn reserved_use_case_is_rejected_at_build() {
        let result = KeyDescriptor::<()>::builder("user_id", "watermark")
            .id_fn(|_: &()| Ok("1".to_string()))
            .build();
        assert!(matches!(result, Err(CacheError::ReservedUseCase)));
    }

    #[test]
    fn missing_id_fn_is_rejected_at_build() {
        let result = KeyDescriptor::<()>::builder("user_id", "profile").build();
        assert!(matches!(result, Err(CacheError::KeyBuild(_))));
    }

    #[test]
    fn adapter_failure_surfaces_as_key_build_error() {
        let descriptor = KeyDescriptor::builder("user_id", "profile")
            .id_fn(|_: &CallArgs| Err("no id present".to_string()))
            .build()
            .unwrap();
        let result = descriptor.build_key(&CallArgs {
            user_id: "u1".to_string(),
            email: "a@x".to_string(),
        });
        assert!(matches!(result, Err(CacheError::KeyBuild(_))));
    }

    #[test]
    fn default_args_fn_produces_empty_map_when_unset() {
        let descriptor = KeyDescriptor::builder("user_id", "profile")
            .id_fn(|a: &CallArgs| Ok(a.user_id.clone()))
            .build()
            .unwrap();
        let key = descriptor
            .build_key(&CallArgs {
                user_id: "u1".to_string(),
                email: "a@x".to_string(),
            })
            .unwrap();
        assert!(key.args.is_empty());
    }
}
