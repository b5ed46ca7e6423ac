//! Codec registry.
//!
//! A [`CodecRegistry`] maps a content-subtype to a codec. Registries are built
//! during startup and frozen afterwards: the process-wide registry is installed
//! once with [`install`] (or lazily defaults to json + proto on first use) and
//! is read-only from then on, so lookups on the request path take no lock.
//!
//! Servers and clients may also carry their own registry instead of the global
//! one; both paths share the same lookup semantics.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::codec::{JsonCodec, ProtoCodec, JSON};
use crate::Codec;

/// Mapping from content-subtype to codec.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<&'static str, Arc<dyn Codec>>,
    fallback: &'static str,
}

impl CodecRegistry {
    /// Creates an empty registry whose fallback name is `"json"`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            codecs: HashMap::new(),
            fallback: JSON,
        }
    }

    /// Creates a registry holding the `json` and `proto` codecs.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(JsonCodec));
        registry.register(Arc::new(ProtoCodec));
        registry
    }

    /// Stores `codec` under its name, returning the codec it replaced.
    ///
    /// Registering an existing name overwrites it; the last registration wins.
    pub fn register(&mut self, codec: Arc<dyn Codec>) -> Option<Arc<dyn Codec>> {
        let name = codec.name();
        let previous = self.codecs.insert(name, codec);
        if previous.is_some() {
            tracing::debug!(codec = name, "codec registration replaced an existing codec");
        }
        previous
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.register(codec);
        self
    }

    /// Sets the name used when a content type is absent or malformed.
    #[must_use]
    pub fn with_fallback(mut self, name: &'static str) -> Self {
        self.fallback = name;
        self
    }

    /// Returns the fallback codec name.
    #[must_use]
    pub fn fallback(&self) -> &'static str {
        self.fallback
    }

    /// Looks a codec up by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Codec>> {
        self.codecs.get(name).cloned()
    }

    /// Resolves the codec for a content-type header value.
    ///
    /// The header is reduced to its subtype with [`content_subtype`]; a missing
    /// or malformed header resolves to the fallback name. `None` means no codec
    /// is registered for the resolved name.
    #[must_use]
    pub fn for_content_type(&self, content_type: Option<&str>) -> Option<Arc<dyn Codec>> {
        let name = codec_name(content_type, self.fallback);
        self.lookup(&name)
    }

    /// Returns the registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.codecs.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("codecs", &self.names())
            .field("fallback", &self.fallback)
            .finish()
    }
}

static GLOBAL: OnceLock<CodecRegistry> = OnceLock::new();

/// Installs the process-wide registry.
///
/// Succeeds only once and only before the registry was first read; otherwise
/// the rejected registry is handed back.
pub fn install(registry: CodecRegistry) -> Result<(), CodecRegistry> {
    GLOBAL.set(registry)
}

/// Returns the process-wide registry, initializing it with json + proto when
/// nothing was installed.
pub fn global() -> &'static CodecRegistry {
    GLOBAL.get_or_init(CodecRegistry::with_defaults)
}

/// Looks a codec up by name in the process-wide registry.
pub fn lookup(name: &str) -> Option<Arc<dyn Codec>> {
    global().lookup(name)
}

/// Extracts the subtype of a MIME type: the text after `/` and before any `;`,
/// trimmed and lowercased.
///
/// ```
/// use tandem_encoding::content_subtype;
///
/// assert_eq!(content_subtype("application/json; charset=utf-8").as_deref(), Some("json"));
/// assert_eq!(content_subtype("Application/X-Protobuf").as_deref(), Some("x-protobuf"));
/// assert_eq!(content_subtype("json"), None);
/// ```
pub fn content_subtype(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next().unwrap_or_default();
    let (_, subtype) = essence.split_once('/')?;
    let subtype = subtype.trim();
    if subtype.is_empty() {
        return None;
    }
    Some(subtype.to_ascii_lowercase())
}

/// Resolves a codec name from an optional content type.
///
/// A gRPC-style `grpc+<name>` subtype resolves to `<name>`. `x-protobuf` and
/// `protobuf` are aliases for `proto`; anything without a usable subtype
/// resolves to `fallback`.
///
/// ```
/// use tandem_encoding::codec_name;
///
/// assert_eq!(codec_name(Some("application/grpc+json"), "json"), "json");
/// assert_eq!(codec_name(Some("application/x-protobuf"), "json"), "proto");
/// assert_eq!(codec_name(None, "json"), "json");
/// ```
pub fn codec_name(content_type: Option<&str>, fallback: &str) -> String {
    let Some(subtype) = content_type.and_then(content_subtype) else {
        return fallback.to_string();
    };
    let name = match subtype.strip_prefix("grpc+") {
        Some(inner) if !inner.is_empty() => inner,
        _ => subtype.as_str(),
    };
    match name {
        "x-protobuf" | "protobuf" => crate::codec::PROTO.to_string(),
        _ => name.to_string(),
    }
}
