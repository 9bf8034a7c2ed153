use serde::Serialize;

/// Remote image servers addressable by a `<namespace>:` prefix.
const REMOTES: &[Remote] = &[
    Remote {
        prefix: "ubuntu:",
        server: "https://cloud-images.ubuntu.com/releases",
        protocol: "simplestreams",
    },
    Remote {
        prefix: "images:",
        server: "https://images.lxd.canonical.com",
        protocol: "simplestreams",
    },
];

struct Remote {
    prefix: &'static str,
    server: &'static str,
    protocol: &'static str,
}

/// Where an image comes from. Empty `server` and `protocol` mean the
/// daemon's local image store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageSource {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub server: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub alias: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,
}

impl ImageSource {
    pub fn is_local(&self) -> bool {
        self.server.is_empty()
    }
}

/// Resolve a shorthand image identifier such as `ubuntu:24.04` or
/// `images:alpine/3.18`. Anything without a known prefix is treated as an
/// alias in the local store. The prefix match is exact and case-sensitive and
/// needs a non-empty remainder.
pub fn resolve(image: &str) -> ImageSource {
    if image.is_empty() {
        return ImageSource::default();
    }

    for remote in REMOTES {
        if let Some(alias) = image.strip_prefix(remote.prefix)
            && !alias.is_empty()
        {
            return ImageSource {
                server: remote.server.to_string(),
                alias: alias.to_string(),
                protocol: remote.protocol.to_string(),
            };
        }
    }

    ImageSource {
        server: String::new(),
        alias: image.to_string(),
        protocol: String::new(),
    }
}
