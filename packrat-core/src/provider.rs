use std::{collections::HashMap, fmt, path::Path, str::FromStr, sync::Arc};

/// Transfer backend associated with a destination.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone)]
pub enum ProviderKind {
    Local,
    GoogleDrive,
    OneDrive,
}

impl ProviderKind {
    /// Tag stored with destinations and used as the URI scheme of remote archives.
    pub fn tag(&self) -> &'static str {
        match self {
            ProviderKind::Local => "local",
            ProviderKind::GoogleDrive => "gdrive",
            ProviderKind::OneDrive => "onedrive",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider '{0}'")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(ProviderKind::Local),
            "gdrive" | "google-drive" => Ok(ProviderKind::GoogleDrive),
            "onedrive" => Ok(ProviderKind::OneDrive),
            _ => Err(UnknownProvider(s.to_owned())),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct RemoteId(pub String);

/// A storage backend archives can be uploaded to and downloaded from.
#[async_trait::async_trait]
pub trait Provider: fmt::Debug + Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn display_name(&self) -> &str;

    /// Acquires credentials; returns whether the provider is usable afterwards.
    async fn authenticate(&self) -> eyre::Result<bool>;

    async fn is_authenticated(&self) -> bool;

    async fn free_space(&self) -> eyre::Result<Option<u64>>;

    /// Uploads a single file into `remote_folder`. `Ok(None)` means the provider accepted
    /// the request but did not hand back an identifier, which counts as a failed upload.
    async fn upload(&self, local_path: &Path, remote_folder: &str)
        -> eyre::Result<Option<RemoteId>>;

    async fn download(&self, remote_id: &RemoteId, local_path: &Path) -> eyre::Result<bool>;

    async fn remote_hash(&self, remote_id: &RemoteId) -> eyre::Result<Option<String>>;

    async fn delete(&self, remote_id: &RemoteId) -> eyre::Result<bool>;
}

/// The configured providers, looked up by a destination's provider tag.
#[derive(Debug, Clone, Default)]
pub struct Providers(HashMap<ProviderKind, Arc<dyn Provider>>);

impl Providers {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with(mut self, provider: Arc<dyn Provider>) -> Self {
        self.insert(provider);
        self
    }

    pub fn insert(&mut self, provider: Arc<dyn Provider>) {
        self.0.insert(provider.kind(), provider);
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn Provider>> {
        self.0.get(&kind).cloned()
    }

    pub fn kinds(&self) -> impl Iterator<Item = ProviderKind> + '_ {
        self.0.keys().copied()
    }
}
