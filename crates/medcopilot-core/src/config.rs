//! Layered configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `APP_*` env vars (`__` separates nested keys, e.g.
//! `APP_EMBEDDING__BACKEND=hash`). Relative paths are resolved against the
//! directory the config files were read from.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::types::DocumentKind;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
    env_name: String,
}

impl Config {
    /// Load from the current directory, honouring `RUST_ENV` (default `dev`).
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."), None)
    }

    pub fn load_from(base_dir: &Path, env_name: Option<&str>) -> anyhow::Result<Self> {
        let env_name = match env_name {
            Some(name) => name.to_string(),
            None => env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string()),
        };

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(base_dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base_dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base_dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base_dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base_dir: base_dir.to_path_buf(), env_name };
        config.settings()?;
        Ok(config)
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed view of the merged configuration with paths resolved and validated.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to parse configuration: {}", e))?;
        settings.resolve_paths(&self.base_dir);
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub embedding: EmbeddingSettings,
    pub indexing: IndexingSettings,
    pub search: SearchSettings,
    pub corpora: BTreeMap<String, CorpusSettings>,
    pub answer: AnswerSettings,
    pub fetch: FetchSettings,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// all-MiniLM-L6-v2 style BERT encoder loaded from `model_dir`.
    Minilm,
    /// Deterministic token-hash vectors; no model weights needed.
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub model_dir: PathBuf,
    pub max_len: usize,
    pub hash_dim: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Minilm,
            model_dir: PathBuf::from("models/all-MiniLM-L6-v2"),
            max_len: 256,
            hash_dim: 384,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingSettings {
    /// Texts per embedding call. Only affects throughput, never the vectors.
    pub batch_size: usize,
    pub max_pdf_pages: usize,
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self { batch_size: 16, max_pdf_pages: 201 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub default_k: usize,
    pub preview_chars: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { default_k: 5, preview_chars: 1200 }
    }
}

/// One independently indexed corpus with its own snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorpusSettings {
    pub documents_dir: PathBuf,
    pub snapshot_path: PathBuf,
    pub min_unit_chars: usize,
    pub kinds: Vec<DocumentKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerSettings {
    /// Falls back to `GROQ_API_KEY` when unset.
    pub api_key: Option<String>,
    pub base_url: String,
    /// Tried in order until one answers.
    pub models: Vec<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            models: vec![
                "llama-3.3-70b-versatile".to_string(),
                "llama-3.2-90b-text-preview".to_string(),
                "llama-3.1-8b-instant".to_string(),
            ],
            temperature: 0.2,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub pubmed_dir: PathBuf,
    pub trials_dir: PathBuf,
    pub max_results: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            pubmed_dir: PathBuf::from("research_ai/data/pubmed"),
            trials_dir: PathBuf::from("research_ai/trials_data"),
            max_results: 50,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        let mut corpora = BTreeMap::new();
        corpora.insert(
            "hospital".to_string(),
            CorpusSettings {
                documents_dir: PathBuf::from("medical_library"),
                snapshot_path: PathBuf::from("vector_cache/hospital.snapshot"),
                min_unit_chars: 100,
                kinds: vec![DocumentKind::Pdf, DocumentKind::PlainText],
            },
        );
        corpora.insert(
            "pubmed".to_string(),
            CorpusSettings {
                documents_dir: PathBuf::from("research_ai/data/pubmed"),
                snapshot_path: PathBuf::from("research_ai/vector_db/pubmed.snapshot"),
                min_unit_chars: 200,
                kinds: vec![DocumentKind::PubMedXml],
            },
        );
        corpora.insert(
            "trials".to_string(),
            CorpusSettings {
                documents_dir: PathBuf::from("research_ai/trials_data"),
                snapshot_path: PathBuf::from("research_ai/vector_trials/trials.snapshot"),
                min_unit_chars: 100,
                kinds: vec![DocumentKind::TrialsJson],
            },
        );
        Self {
            embedding: EmbeddingSettings::default(),
            indexing: IndexingSettings::default(),
            search: SearchSettings::default(),
            corpora,
            answer: AnswerSettings::default(),
            fetch: FetchSettings::default(),
        }
    }
}

impl Settings {
    pub fn corpus(&self, name: &str) -> crate::Result<&CorpusSettings> {
        self.corpora.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.corpora.keys().map(String::as_str).collect();
            crate::Error::InvalidConfig(format!("unknown corpus '{}' (known: {})", name, known.join(", ")))
        })
    }

    fn resolve_paths(&mut self, base: &Path) {
        self.embedding.model_dir = resolve_path(base, &self.embedding.model_dir);
        for corpus in self.corpora.values_mut() {
            corpus.documents_dir = resolve_path(base, &corpus.documents_dir);
            corpus.snapshot_path = resolve_path(base, &corpus.snapshot_path);
        }
        self.fetch.pubmed_dir = resolve_path(base, &self.fetch.pubmed_dir);
        self.fetch.trials_dir = resolve_path(base, &self.fetch.trials_dir);
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.indexing.batch_size == 0 {
            anyhow::bail!("indexing.batch_size must be > 0");
        }
        if self.embedding.max_len == 0 {
            anyhow::bail!("embedding.max_len must be > 0");
        }
        // APP_USE_FAKE_EMBEDDINGS switches any backend to the hash embedder.
        if self.embedding.hash_dim == 0 {
            anyhow::bail!("embedding.hash_dim must be > 0");
        }
        if self.search.default_k == 0 {
            anyhow::bail!("search.default_k must be > 0");
        }
        for (name, corpus) in &self.corpora {
            if corpus.kinds.is_empty() {
                anyhow::bail!("corpora.{}.kinds must not be empty", name);
            }
        }
        Ok(())
    }
}

fn resolve_path(base: &Path, p: &Path) -> PathBuf {
    resolve_with_base(base, p.to_string_lossy())
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_cover_three_separate_corpora() {
        let tmp = TempDir::new().unwrap();
        let settings = Config::load_from(tmp.path(), Some("test")).unwrap().settings().unwrap();

        assert_eq!(settings.corpora.len(), 3);
        let hospital = settings.corpus("hospital").unwrap();
        let pubmed = settings.corpus("pubmed").unwrap();
        assert_eq!(hospital.min_unit_chars, 100);
        assert_eq!(pubmed.min_unit_chars, 200);
        assert_ne!(hospital.snapshot_path, pubmed.snapshot_path);
        assert!(hospital.snapshot_path.starts_with(tmp.path()));
        assert_eq!(settings.indexing.max_pdf_pages, 201);
    }

    #[test]
    fn env_file_overrides_base_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "[indexing]\nbatch_size = 8\n\n[corpora.notes]\ndocuments_dir = \"notes\"\nsnapshot_path = \"idx/notes.snapshot\"\nmin_unit_chars = 10\nkinds = [\"plain_text\"]\n",
        )
        .unwrap();
        std::fs::write(tmp.path().join("config.prod.toml"), "[indexing]\nbatch_size = 64\n").unwrap();

        let settings = Config::load_from(tmp.path(), Some("prod")).unwrap().settings().unwrap();
        assert_eq!(settings.indexing.batch_size, 64);
        let notes = settings.corpus("notes").unwrap();
        assert_eq!(notes.kinds, vec![DocumentKind::PlainText]);
        assert_eq!(notes.documents_dir, tmp.path().join("notes"));
        assert!(settings.corpora.contains_key("hospital"), "defaults are merged, not replaced");
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("config.toml"), "[indexing]\nbatch_size = 0\n").unwrap();
        assert!(Config::load_from(tmp.path(), Some("test")).is_err());
    }

    #[test]
    fn zero_hash_dim_is_rejected_for_any_backend() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("config.toml"), "[embedding]\nbackend = \"minilm\"\nhash_dim = 0\n").unwrap();
        let err = Config::load_from(tmp.path(), Some("test")).and_then(|c| c.settings()).unwrap_err();
        assert!(err.to_string().contains("hash_dim"));
    }

    #[test]
    fn unknown_corpus_lists_known_names() {
        let err = Settings::default().corpus("radiology").unwrap_err().to_string();
        assert!(err.contains("radiology"));
        assert!(err.contains("hospital"));
    }

    #[test]
    fn absolute_paths_are_kept() {
        let base = Path::new("/srv/medcopilot");
        assert_eq!(resolve_with_base(base, "/data/x"), PathBuf::from("/data/x"));
        assert_eq!(resolve_with_base(base, "data/x"), base.join("data/x"));
    }
}
