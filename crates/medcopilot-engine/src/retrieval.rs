use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

use medcopilot_core::config::Settings;
use medcopilot_core::extract::{collect_document_paths, load_documents, DocumentExtractor};
use medcopilot_core::{
    BuildResult, DocumentKind, Embedder, Error, Result, SearchResult, SourceDocument, TextUnit, TextUnitExtractor,
};
use medcopilot_vector::{snapshot, Entry, FlatIndex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub snapshot_path: PathBuf,
    /// Units with fewer trimmed characters than this are not indexed.
    pub min_unit_chars: usize,
    /// Texts per embedding call.
    pub batch_size: usize,
}

impl EngineSettings {
    pub fn new(snapshot_path: impl Into<PathBuf>, min_unit_chars: usize) -> Self {
        Self { snapshot_path: snapshot_path.into(), min_unit_chars, batch_size: 16 }
    }

    pub fn for_corpus(settings: &Settings, corpus: &str) -> Result<Self> {
        let c = settings.corpus(corpus)?;
        Ok(Self {
            snapshot_path: c.snapshot_path.clone(),
            min_unit_chars: c.min_unit_chars,
            batch_size: settings.indexing.batch_size,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub loaded: bool,
    pub snapshot_path: PathBuf,
    pub snapshot_exists: bool,
    pub unit_count: usize,
    pub dimension: Option<usize>,
    pub embedder_id: Option<String>,
}

/// Retrieved units stitched into the text handed to answer synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundingContext {
    /// Unit texts in rank order, separated by blank lines.
    pub context: String,
    pub sources: Vec<String>,
    pub results: Vec<SearchResult>,
}

impl GroundingContext {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Build and query one corpus.
///
/// The current index is an immutable `Arc<FlatIndex>`. A build produces a new
/// index, persists it, and only then swaps it in; searches already running
/// keep the index they started with. Builds and snapshot loads are serialized.
pub struct RetrievalEngine {
    embedder: Arc<dyn Embedder>,
    extractor: Box<dyn TextUnitExtractor>,
    settings: EngineSettings,
    current: RwLock<Option<Arc<FlatIndex>>>,
    build_lock: Mutex<()>,
    show_progress: bool,
}

impl RetrievalEngine {
    pub fn new(embedder: Arc<dyn Embedder>, settings: EngineSettings) -> Self {
        Self {
            embedder,
            extractor: Box::new(DocumentExtractor::new()),
            settings,
            current: RwLock::new(None),
            build_lock: Mutex::new(()),
            show_progress: false,
        }
    }

    pub fn with_extractor(mut self, extractor: impl TextUnitExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Show a terminal progress bar while embedding.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Walk `dir` for files of `kinds` and build from them. Files that cannot
    /// be read are reported in `failed_documents` alongside extraction failures.
    pub fn build_from_dir(&self, dir: &Path, kinds: &[DocumentKind]) -> Result<BuildResult> {
        let paths = collect_document_paths(dir, kinds);
        tracing::info!("Found {} document(s) under {}", paths.len(), dir.display());
        let (documents, unreadable) = load_documents(&paths);
        self.build_inner(&documents, unreadable)
    }

    /// Full rebuild from `documents`, replacing any previous index and snapshot.
    pub fn build(&self, documents: &[SourceDocument]) -> Result<BuildResult> {
        self.build_inner(documents, Vec::new())
    }

    fn build_inner(&self, documents: &[SourceDocument], failed_documents: Vec<String>) -> Result<BuildResult> {
        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let started = Instant::now();

        let mut result = BuildResult { failed_documents, ..BuildResult::default() };
        let mut units = Vec::new();
        for document in documents {
            let unit_results = match self.extractor.extract(document) {
                Ok(unit_results) => unit_results,
                Err(e) => {
                    tracing::warn!("Skipping document: {}", e);
                    result.failed_documents.push(document.name.clone());
                    continue;
                }
            };
            for unit in unit_results {
                match unit {
                    Ok(unit) => {
                        let text = unit.text.trim();
                        if text.chars().count() < self.settings.min_unit_chars {
                            result.short_units += 1;
                        } else {
                            units.push(TextUnit::new(text, unit.source));
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Skipping unit: {}", e);
                        result.unit_errors += 1;
                    }
                }
            }
        }

        if units.is_empty() {
            return Err(Error::NoDocumentsIndexed { failed_documents: result.failed_documents });
        }
        tracing::info!(
            "Embedding {} unit(s) ({} short, {} failed document(s))",
            units.len(),
            result.short_units,
            result.failed_documents.len()
        );

        let vectors = self.embed_units(&units)?;
        let mut index = FlatIndex::new(self.embedder.embedder_id(), self.embedder.dim());
        index.add(vectors.into_iter().zip(units).map(|(v, u)| Entry::new(v, u)).collect())?;

        snapshot::save(&index, &self.settings.snapshot_path)?;
        result.unit_count = index.len();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(index));

        tracing::info!("Built index of {} unit(s) in {:.2?}", result.unit_count, started.elapsed());
        Ok(result)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} units ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }

    fn embed_units(&self, units: &[TextUnit]) -> Result<Vec<Vec<f32>>> {
        let pb = self.progress_bar(units.len());
        let mut vectors = Vec::with_capacity(units.len());
        for batch in units.chunks(self.settings.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|u| u.text.clone()).collect();
            let embedded = self.embedder.embed_batch(&texts)?;
            if embedded.len() != texts.len() {
                return Err(Error::Embedding(format!(
                    "embedder returned {} vectors for {} texts",
                    embedded.len(),
                    texts.len()
                )));
            }
            vectors.extend(embedded);
            pb.inc(batch.len() as u64);
        }
        pb.finish_and_clear();
        Ok(vectors)
    }

    /// Load the snapshot from disk, replacing the in-memory index.
    ///
    /// Waits for a running build, so the index read is never older than one
    /// a build has already swapped in.
    pub fn load(&self) -> Result<usize> {
        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let index = self.read_snapshot()?;
        let len = index.len();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(index);
        Ok(len)
    }

    fn read_snapshot(&self) -> Result<Arc<FlatIndex>> {
        let index = snapshot::load(&self.settings.snapshot_path)?;
        if index.dimension() != self.embedder.dim() {
            return Err(Error::DimensionMismatch { expected: self.embedder.dim(), actual: index.dimension() });
        }
        if index.embedder_id() != self.embedder.embedder_id() {
            tracing::warn!(
                "Snapshot was built with {}, querying with {}",
                index.embedder_id(),
                self.embedder.embedder_id()
            );
        }
        Ok(Arc::new(index))
    }

    fn current_index(&self) -> Result<Arc<FlatIndex>> {
        if let Some(index) = self.current.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return Ok(Arc::clone(index));
        }
        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);
        // A build may have swapped an index in while we waited.
        if let Some(index) = self.current.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return Ok(Arc::clone(index));
        }
        let index = match self.read_snapshot() {
            Ok(index) => index,
            Err(Error::SnapshotNotFound(_)) => return Err(Error::IndexNotReady),
            Err(e) => return Err(e),
        };
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&index));
        Ok(index)
    }

    /// The `k` units closest to `query`, nearest first.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }
        if k == 0 {
            return Err(Error::InvalidTopK);
        }
        let index = self.current_index()?;
        let query_vector = self.embedder.embed_one(query)?;
        let neighbors = index.search(&query_vector, k)?;
        neighbors
            .into_iter()
            .map(|n| {
                let entry = index.lookup(n.row)?;
                Ok(SearchResult { row: n.row, text: entry.text.clone(), source: entry.source.clone(), distance: n.distance })
            })
            .collect()
    }

    pub fn grounding_context(&self, query: &str, k: usize) -> Result<GroundingContext> {
        let results = self.search(query, k)?;
        let context = results.iter().map(|r| r.text.as_str()).collect::<Vec<_>>().join("\n\n");
        let sources = results.iter().map(|r| r.source.clone()).collect();
        Ok(GroundingContext { context, sources, results })
    }

    /// State of the in-memory index. Does not trigger a lazy load.
    pub fn status(&self) -> EngineStatus {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner).clone();
        EngineStatus {
            loaded: current.is_some(),
            snapshot_path: self.settings.snapshot_path.clone(),
            snapshot_exists: self.settings.snapshot_path.is_file(),
            unit_count: current.as_ref().map_or(0, |i| i.len()),
            dimension: current.as_ref().map(|i| i.dimension()),
            embedder_id: current.as_ref().map(|i| i.embedder_id().to_string()),
        }
    }
}
