//! Run orchestrator.
//!
//! Drives the platform loop: inventory → integrity check → identity →
//! evaluation → scheduling → per-item pipeline (cache → throttle →
//! Provider → scorer → media → merge) → atomic catalog write → summary.
//! Platforms run strictly sequentially; items within a platform run on a
//! bounded worker pool.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Local;
use tokio::time::Duration;

use curateur_core::hasher::compute_identity;
use curateur_core::name_parser::normalize_for_match;
use curateur_core::{HashAlgorithm, Language, Platform, PlatformIndex, Region, RomEntity};
use curateur_gamelist::entry::format_release_date;
use curateur_gamelist::integrity::{
    move_media_to_cleanup, move_type_dir_to_cleanup, validate_integrity,
};
use curateur_gamelist::provenance::PROVENANCE_FILE;
use curateur_gamelist::{
    merge_entries, parse_gamelist, write_gamelist, GameEntry, MergePolicy, ProvenanceRecord,
    ProvenanceStore,
};
use curateur_scraper::cache::DEFAULT_TTL_DAYS;
use curateur_scraper::media::{existing_media_path, hash_file, media_dest, select_asset};
use curateur_scraper::scorer::{select_candidate, verify_name, Selection};
use curateur_scraper::{
    Credentials, Endpoint, GameRecord, LookupIdentity, MediaFetcher, MediaKind, ProviderClient,
    QuotaLedger, RateLimit, ResponseCache, ScrapeError, Throttle,
};

use crate::cancel::CancelFlag;
use crate::config::RunConfig;
use crate::error::EngineError;
use crate::evaluator::{evaluate, Action, EvalPolicy};
use crate::pool::WorkerPool;
use crate::prompts::{CandidateChoice, PromptGate, PromptHandler};
use crate::queue::{Priority, WorkItem, WorkQueue};
use crate::scanner::scan_platform;
use crate::summary::{EndpointSummary, PlatformSummary};

const GAMELIST_FILE: &str = "gamelist.xml";

/// Run-level result.
#[derive(Debug)]
pub struct RunSummary {
    pub platforms: Vec<PlatformSummary>,
    pub cancelled: bool,
    /// Set when a fatal error aborted the run.
    pub fatal: Option<String>,
}

/// Owns component lifetimes and drives the per-platform loop.
pub struct Orchestrator {
    config: RunConfig,
    prompts: Arc<PromptGate>,
    cancel: CancelFlag,
}

impl Orchestrator {
    pub fn new(
        config: RunConfig,
        handler: Arc<dyn PromptHandler>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            prompts: Arc::new(PromptGate::new(handler)),
            cancel: CancelFlag::new(),
        })
    }

    /// Handle for wiring the Ctrl-C handler.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub async fn run(&self) -> Result<RunSummary, EngineError> {
        let index = PlatformIndex::load(
            &self.config.paths.platform_index,
            &self.config.paths.rom_root,
        )?;
        let platforms = index.select(&self.config.platforms.selection);
        if platforms.is_empty() {
            return Err(EngineError::config("no platforms selected"));
        }

        let creds = Credentials::from_env().map_err(EngineError::Scrape)?;
        let timeout = Duration::from_secs(self.config.api.request_timeout_s);
        let (client, user_info) = ProviderClient::connect(creds, timeout)
            .await
            .map_err(EngineError::Scrape)?;
        let client = Arc::new(client);

        let workers = effective_workers(
            user_info.max_threads(),
            self.config.api.r#override.max_workers,
        );
        let rpm = Throttle::effective_limit(
            user_info.max_requests_per_min(),
            self.config.api.r#override.requests_per_minute,
        );
        let daily_cap = QuotaLedger::effective_cap(
            Some(user_info.max_requests_per_day()),
            self.config.api.r#override.daily_quota,
        );
        let quota = Arc::new(QuotaLedger::new(
            daily_cap,
            self.config.api.quota_warning_ratio,
        ));
        quota.sync_usage(user_info.requests_today());

        log::info!(
            "Connected to Provider: {} workers, {} req/min, {} requests used today",
            workers,
            rpm,
            user_info.requests_today(),
        );

        let mut summaries = Vec::new();
        let mut fatal = None;

        for platform in &platforms {
            if self.cancel.is_cancelled() {
                break;
            }
            match self
                .run_platform(platform, client.clone(), quota.clone(), workers, rpm)
                .await
            {
                Ok((summary, platform_fatal)) => {
                    summaries.push(summary);
                    if let Some(error) = platform_fatal {
                        fatal = Some(error);
                        break;
                    }
                }
                Err(e) => {
                    fatal = Some(e.to_string());
                    break;
                }
            }
        }

        let cancelled = self.cancel.is_cancelled() && fatal.is_none();
        for summary in &summaries {
            log::info!(
                "{}: scanned {}, skipped {}, scraped {}, media-only {}, updated {}, \
                 failed {}, not found {}",
                summary.platform,
                summary.scanned,
                summary.skipped,
                summary.full_scraped,
                summary.media_only,
                summary.updated,
                summary.failed,
                summary.not_found,
            );
        }

        Ok(RunSummary {
            platforms: summaries,
            cancelled,
            fatal,
        })
    }

    async fn run_platform(
        &self,
        platform: &Platform,
        client: Arc<ProviderClient>,
        quota: Arc<QuotaLedger>,
        workers: u32,
        rpm: u32,
    ) -> Result<(PlatformSummary, Option<String>), EngineError> {
        let started = Local::now();
        let mut summary = PlatformSummary::new(&platform.name, started);
        let dry_run = self.config.runtime.dry_run;

        let Some(system_id) = platform.provider_id else {
            log::warn!(
                "Skipping '{}': no Provider system ID known",
                platform.name
            );
            summary.finished = Local::now();
            return Ok((summary, None));
        };

        log::info!("Processing platform '{}'", platform.name);
        let catalog_dir = self.config.paths.catalog_root.join(&platform.name);
        let gamelist_path = catalog_dir.join(GAMELIST_FILE);

        // Inventory (C1)
        let scan = scan_platform(platform)?;
        let mut roms = scan.roms;
        summary
            .conflicts
            .extend(scan.conflicts.iter().map(|c| format!("{}: {}", c.name, c.detail)));

        // Existing catalog + provenance (C3)
        let mut existing_entries = match parse_gamelist(&gamelist_path) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!(
                    "Could not parse {}: {e}; treating catalog as empty",
                    gamelist_path.display()
                );
                Vec::new()
            }
        };
        let mut provenance = ProvenanceStore::load(catalog_dir.join(PROVENANCE_FILE));

        // Integrity check (C3.1)
        let rom_paths: HashSet<String> = roms.iter().map(|r| r.gamelist_path()).collect();
        let rom_stems: HashSet<String> = roms.iter().map(|r| r.basename.clone()).collect();
        let mut catalog_dirty = false;
        let report = validate_integrity(&existing_entries, &rom_paths, &rom_stems);
        if !report.passes(self.config.scraping.integrity_threshold) {
            let confirmed = self
                .prompts
                .confirm_integrity_cleanup(
                    platform.name.clone(),
                    report.missing_paths.len(),
                    report.total_entries,
                    report.ratio,
                )
                .await;
            if confirmed && !dry_run {
                let missing: HashSet<String> = report.missing_paths.iter().cloned().collect();
                let stems: HashSet<String> = existing_entries
                    .iter()
                    .filter(|e| missing.contains(&e.path))
                    .map(|e| e.media_stem())
                    .collect();
                let type_dirs: Vec<&str> =
                    MediaKind::ALL.iter().map(|k| k.directory()).collect();
                let moves = move_media_to_cleanup(
                    &self.config.paths.media_root,
                    &platform.name,
                    &type_dirs,
                    &stems,
                )?;
                summary.cleanup_moves.extend(
                    moves
                        .iter()
                        .map(|(from, to)| format!("{} -> {}", from.display(), to.display())),
                );
                for stem in &stems {
                    provenance.remove(stem);
                }
                existing_entries.retain(|e| !missing.contains(&e.path));
                catalog_dirty = true;
                log::info!(
                    "Pruned {} orphan entries from '{}'",
                    missing.len(),
                    platform.name
                );
            }
        }

        // Media types disabled since a previous run
        if !dry_run {
            self.cleanup_disabled_media(platform, &mut summary).await?;
        }

        // Identity (C2)
        let algorithm = self.config.runtime.hash_algorithm;
        let size_cap = self.config.runtime.hash_size_cap_bytes;
        let mut readable = Vec::with_capacity(roms.len());
        for mut rom in roms {
            match compute_identity(&rom.primary_file, algorithm, size_cap) {
                Ok(identity) => {
                    rom.size = identity.size;
                    rom.hash = identity.hash;
                    readable.push(rom);
                }
                Err(e) => {
                    log::warn!("Dropping {}: primary file unreadable: {e}", rom.basename);
                    summary
                        .conflicts
                        .push(format!("{}: primary file unreadable: {e}", rom.basename));
                }
            }
        }
        roms = readable;
        summary.scanned = roms.len();

        // Evaluation (C4) + scheduling (C12)
        let enabled_media = self.config.enabled_media();
        let policy = EvalPolicy {
            update: self.config.scraping.update_policy,
            skip_scraped: self.config.scraping.skip_scraped,
            enabled_media: enabled_media.clone(),
        };
        let existing_by_path: HashMap<String, GameEntry> = existing_entries
            .iter()
            .map(|e| (e.path.clone(), e.clone()))
            .collect();

        let queue = Arc::new(WorkQueue::new(self.config.api.max_retries));
        let mut outstanding = 0usize;
        for (rom_index, rom) in roms.iter().enumerate() {
            let entry = existing_by_path.get(&rom.gamelist_path());
            let record = provenance.get(&rom.basename);
            let presence: BTreeMap<MediaKind, bool> = enabled_media
                .iter()
                .map(|&kind| {
                    let present = existing_media_path(
                        &self.config.paths.media_root,
                        &platform.name,
                        kind,
                        &rom.basename,
                    )
                    .is_some();
                    (kind, present)
                })
                .collect();
            let decision = evaluate(rom, entry, record, &presence, &policy);
            log::debug!(
                "Decision for {}: {} ({})",
                rom.basename,
                decision.action,
                decision.reason
            );
            match decision.action {
                Action::Skip => summary.skipped += 1,
                action => {
                    let priority = if action == Action::MediaOnly {
                        Priority::Low
                    } else {
                        Priority::Normal
                    };
                    queue.push(
                        WorkItem {
                            rom_index,
                            action,
                            media_needed: decision.media_needed,
                            retry_count: 0,
                            last_error: None,
                        },
                        priority,
                    );
                    outstanding += 1;
                }
            }
        }

        // Per-platform shared state
        let throttle = Arc::new(Throttle::new(
            RateLimit::per_minute(rpm),
            Duration::from_secs(self.config.api.initial_retry_delay_s),
        ));
        let cache = ResponseCache::open(&catalog_dir, DEFAULT_TTL_DAYS, !dry_run);
        let fetcher = MediaFetcher::new(
            client.http(),
            Duration::from_secs(self.config.api.request_timeout_s.max(120)),
            self.config.media.validation,
            self.config.media.min_image_side,
        );
        let provenance_by_index: HashMap<usize, ProvenanceRecord> = roms
            .iter()
            .enumerate()
            .filter_map(|(i, rom)| provenance.get(&rom.basename).cloned().map(|p| (i, p)))
            .collect();

        let ctx = Arc::new(PlatformCtx {
            platform_name: platform.name.clone(),
            system_id,
            roms,
            existing_by_path,
            provenance_by_index,
            preferred_regions: self.config.preferred_regions(),
            preferred_languages: self.config.preferred_languages(),
            merge_policy: self.config.merge_policy(),
            name_threshold: self.config.scraping.name_verification.threshold(),
            search_enabled: self.config.search.enable_fallback,
            search_threshold: self.config.search.threshold,
            search_max_results: self.config.search.max_results,
            interactive: self.config.search.interactive,
            skip_existing_media: self.config.media.skip_existing_media,
            media_root: self.config.paths.media_root.clone(),
            catalog_dir: catalog_dir.clone(),
            algorithm,
            dry_run,
            client,
            fetcher,
            throttle: throttle.clone(),
            quota,
            cache,
            cancel: self.cancel.clone(),
            prompts: self.prompts.clone(),
            staged: Mutex::new(HashMap::new()),
            error_counts: Mutex::new(HashMap::new()),
            change_lines: Mutex::new(Vec::new()),
        });

        // Workers (C12/C13)
        if outstanding == 0 {
            queue.close();
        }
        let worker_queue = queue.clone();
        let worker_ctx = ctx.clone();
        let mut pool = WorkerPool::start(workers as usize, worker_queue, move |item| {
            process_item(worker_ctx.clone(), item)
        });

        let mut fatal: Option<String> = None;
        while let Some(outcome) = pool.recv().await {
            match outcome {
                ItemOutcome::Done { action, .. } => {
                    queue.mark_processed();
                    match action {
                        Action::FullScrape => summary.full_scraped += 1,
                        Action::MediaOnly => summary.media_only += 1,
                        Action::Update => summary.updated += 1,
                        Action::Skip => {}
                    }
                    outstanding = outstanding.saturating_sub(1);
                }
                ItemOutcome::NotFound { rom_index } => {
                    queue.mark_not_found(&ctx.roms[rom_index].basename);
                    queue.mark_processed();
                    outstanding = outstanding.saturating_sub(1);
                }
                ItemOutcome::Retry { item, error } => {
                    ctx.count_error(&error);
                    if !queue.retry(item, &error) {
                        outstanding = outstanding.saturating_sub(1);
                    }
                }
                ItemOutcome::Fatal { error } => {
                    log::error!("Fatal error on '{}': {error}", ctx.platform_name);
                    fatal = Some(error);
                    self.cancel.cancel();
                    outstanding = outstanding.saturating_sub(1);
                }
                ItemOutcome::Cancelled { rom_index } => {
                    summary
                        .pending_on_cancel
                        .push(ctx.roms[rom_index].basename.clone());
                    outstanding = outstanding.saturating_sub(1);
                }
            }

            if self.cancel.is_cancelled() {
                for pending in queue.drain_pending() {
                    summary
                        .pending_on_cancel
                        .push(ctx.roms[pending.rom_index].basename.clone());
                    outstanding = outstanding.saturating_sub(1);
                }
                queue.close();
            } else if outstanding == 0 {
                queue.close();
            }
        }

        // Finalize (C10 staged -> C11)
        summary.failed = queue.failed_items().len();
        let not_found = queue.not_found_list();
        summary.not_found = not_found.len();
        summary.change_lines = ctx.change_lines.lock().expect("change lock").clone();
        summary.error_counts = ctx.error_counts.lock().expect("error lock").clone();
        let (hits, misses) = ctx.cache.stats();
        summary.cache_hits = hits;
        summary.cache_misses = misses;
        for endpoint in [Endpoint::GameInfo, Endpoint::Search] {
            let stats = throttle.stats(endpoint).await;
            summary.endpoints.push(EndpointSummary {
                endpoint: endpoint.as_str(),
                total_wait_s: stats.total_wait.as_secs_f64(),
                events_429: stats.events_429,
                max_multiplier: stats.max_multiplier,
            });
        }

        if !dry_run {
            std::fs::create_dir_all(&catalog_dir)?;
            let mut staged = ctx.staged.lock().expect("staged lock");
            let wrote_anything = !staged.is_empty() || catalog_dirty;
            let mut final_entries: Vec<GameEntry> = Vec::new();
            let mut covered_paths: HashSet<String> = HashSet::new();
            for rom in &ctx.roms {
                covered_paths.insert(rom.gamelist_path());
                if let Some(staged_entry) = staged.remove(&rom.basename) {
                    provenance.upsert(&rom.basename, staged_entry.provenance);
                    final_entries.push(staged_entry.entry);
                } else if let Some(existing) = ctx.existing_by_path.get(&rom.gamelist_path()) {
                    final_entries.push(existing.clone());
                }
            }
            // Entries whose ROM was not scanned this run (and survived the
            // integrity check) are preserved untouched.
            for entry in &existing_entries {
                if !covered_paths.contains(&entry.path) {
                    final_entries.push(entry.clone());
                }
            }
            drop(staged);

            if wrote_anything || !gamelist_path.exists() {
                write_gamelist(&gamelist_path, &platform.name, &final_entries)?;
                provenance.save()?;
            }

            if !not_found.is_empty() {
                let path = catalog_dir.join(format!("{}_not_found.txt", platform.name));
                std::fs::write(&path, not_found.join("\n") + "\n")?;
            }

            summary.finished = Local::now();
            summary.write_to(&catalog_dir.join(summary.filename()))?;
        } else {
            summary.finished = Local::now();
            log::info!(
                "Dry run: '{}' would scrape {}, media-only {}, update {}, skip {}",
                platform.name,
                summary.full_scraped,
                summary.media_only,
                summary.updated,
                summary.skipped,
            );
        }

        Ok((summary, fatal))
    }

    /// When a media type was disabled since the last run, offer to move
    /// its files to the CLEANUP tree.
    async fn cleanup_disabled_media(
        &self,
        platform: &Platform,
        summary: &mut PlatformSummary,
    ) -> Result<(), EngineError> {
        let enabled = self.config.enabled_media();
        for kind in MediaKind::ALL {
            if enabled.contains(&kind) {
                continue;
            }
            let dir = self
                .config
                .paths
                .media_root
                .join(&platform.name)
                .join(kind.directory());
            let file_count = match std::fs::read_dir(&dir) {
                Ok(entries) => entries.filter_map(Result::ok).count(),
                Err(_) => continue,
            };
            if file_count == 0 {
                continue;
            }
            let confirmed = self
                .prompts
                .confirm_media_cleanup(
                    platform.name.clone(),
                    kind.directory().to_string(),
                    file_count,
                )
                .await;
            if confirmed {
                let moves = move_type_dir_to_cleanup(
                    &self.config.paths.media_root,
                    &platform.name,
                    kind.directory(),
                )?;
                summary.cleanup_moves.extend(
                    moves
                        .iter()
                        .map(|(from, to)| format!("{} -> {}", from.display(), to.display())),
                );
            }
        }
        Ok(())
    }
}

fn effective_workers(provider_threads: u32, override_workers: Option<u32>) -> u32 {
    let base = provider_threads.max(1);
    match override_workers {
        Some(o) => base.min(o).max(1),
        None => base,
    }
}

// ---- Per-item pipeline -----------------------------------------------------

struct StagedEntry {
    entry: GameEntry,
    provenance: ProvenanceRecord,
}

struct PlatformCtx {
    platform_name: String,
    system_id: u32,
    roms: Vec<RomEntity>,
    existing_by_path: HashMap<String, GameEntry>,
    provenance_by_index: HashMap<usize, ProvenanceRecord>,
    preferred_regions: Vec<Region>,
    preferred_languages: Vec<Language>,
    merge_policy: MergePolicy,
    name_threshold: f64,
    search_enabled: bool,
    search_threshold: f64,
    search_max_results: usize,
    interactive: bool,
    skip_existing_media: bool,
    media_root: PathBuf,
    catalog_dir: PathBuf,
    algorithm: HashAlgorithm,
    dry_run: bool,
    client: Arc<ProviderClient>,
    fetcher: MediaFetcher,
    throttle: Arc<Throttle>,
    quota: Arc<QuotaLedger>,
    cache: ResponseCache,
    cancel: CancelFlag,
    prompts: Arc<PromptGate>,
    staged: Mutex<HashMap<String, StagedEntry>>,
    error_counts: Mutex<HashMap<String, usize>>,
    change_lines: Mutex<Vec<String>>,
}

impl PlatformCtx {
    fn count_error(&self, error: &str) {
        let mut counts = self.error_counts.lock().expect("error lock");
        *counts.entry(error.to_string()).or_insert(0) += 1;
    }

    fn region_chain(&self, rom: &RomEntity) -> Vec<&'static str> {
        let mut chain: Vec<&'static str> = Vec::new();
        for region in rom.regions.iter().chain(self.preferred_regions.iter()) {
            let code = region.provider_code();
            if !chain.contains(&code) {
                chain.push(code);
            }
        }
        if chain.is_empty() {
            chain.push("us");
        }
        chain
    }

    fn language_chain(&self) -> Vec<&'static str> {
        let mut chain: Vec<&'static str> = self
            .preferred_languages
            .iter()
            .map(|l| l.provider_code())
            .collect();
        if !chain.contains(&"en") {
            chain.push("en");
        }
        chain
    }
}

enum ItemOutcome {
    Done { rom_index: usize, action: Action },
    NotFound { rom_index: usize },
    Retry { item: WorkItem, error: String },
    Fatal { error: String },
    Cancelled { rom_index: usize },
}

async fn process_item(ctx: Arc<PlatformCtx>, item: WorkItem) -> ItemOutcome {
    let rom_index = item.rom_index;
    if ctx.cancel.is_cancelled() {
        return ItemOutcome::Cancelled { rom_index };
    }
    let rom = &ctx.roms[rom_index];

    let record = match lookup_record(&ctx, rom).await {
        Ok(Some(record)) => record,
        Ok(None) => return ItemOutcome::NotFound { rom_index },
        Err(e) if e.is_fatal() => {
            return ItemOutcome::Fatal {
                error: e.to_string(),
            }
        }
        Err(e) if e.is_retryable() => {
            return ItemOutcome::Retry {
                item,
                error: e.to_string(),
            }
        }
        Err(ScrapeError::NotFound) => return ItemOutcome::NotFound { rom_index },
        Err(e) => {
            return ItemOutcome::Retry {
                item,
                error: e.to_string(),
            }
        }
    };

    let mut media_paths: BTreeMap<MediaKind, PathBuf> = BTreeMap::new();
    let mut media_hashes: BTreeMap<String, String> = BTreeMap::new();
    if !ctx.dry_run && !item.media_needed.is_empty() && !ctx.cancel.is_cancelled() {
        fetch_media(
            &ctx,
            rom,
            rom_index,
            &record,
            &item.media_needed,
            &mut media_paths,
            &mut media_hashes,
        )
        .await;
    }

    if !ctx.dry_run {
        stage_entry(&ctx, rom, rom_index, &record, media_paths, media_hashes);
    }

    ItemOutcome::Done {
        rom_index,
        action: item.action,
    }
}

/// Cache check → throttle → match-by-identity → (search fallback).
async fn lookup_record(
    ctx: &PlatformCtx,
    rom: &RomEntity,
) -> Result<Option<GameRecord>, ScrapeError> {
    let key = ResponseCache::lookup_key(
        ctx.system_id,
        rom.hash.as_deref(),
        &rom.query_filename,
        rom.size,
    );
    if let Some(record) = ctx.cache.get(&key) {
        log::debug!("Cache hit for {}", rom.basename);
        return Ok(Some(record));
    }

    ctx.quota.check()?;
    ctx.throttle.acquire(Endpoint::GameInfo).await;

    let identity = LookupIdentity {
        filename: &rom.query_filename,
        size: rom.size,
        hash: rom.hash.as_deref(),
        algorithm: ctx.algorithm,
    };

    match ctx.client.match_identity(ctx.system_id, &identity).await {
        Ok((record, user_quota)) => {
            ctx.quota.record_call();
            if let Some(q) = user_quota {
                ctx.quota.sync_usage(q.requests_today());
            }
            ctx.throttle.on_success(Endpoint::GameInfo).await;

            let (verified, score) = verify_name(&rom.basename, &record, ctx.name_threshold);
            if !verified {
                log::warn!(
                    "Match for '{}' failed name verification (similarity {score:.2}); \
                     falling back to search",
                    rom.basename
                );
                return search_fallback(ctx, rom).await;
            }

            ctx.cache.put(&key, &record);
            Ok(Some(record))
        }
        Err(ScrapeError::RateLimit { retry_after }) => {
            ctx.quota.record_call();
            ctx.throttle
                .on_rate_limited(Endpoint::GameInfo, retry_after.map(Duration::from_secs))
                .await;
            Err(ScrapeError::RateLimit { retry_after })
        }
        Err(ScrapeError::NotFound) => {
            ctx.quota.record_call();
            ctx.throttle.on_success(Endpoint::GameInfo).await;
            search_fallback(ctx, rom).await
        }
        Err(e) => {
            if e.is_retryable() {
                ctx.quota.record_call();
            }
            Err(e)
        }
    }
}

/// Search-by-name fallback with confidence scoring and the interactive
/// candidate prompt.
async fn search_fallback(
    ctx: &PlatformCtx,
    rom: &RomEntity,
) -> Result<Option<GameRecord>, ScrapeError> {
    if !ctx.search_enabled {
        return Ok(None);
    }

    ctx.quota.check()?;
    ctx.throttle.acquire(Endpoint::Search).await;

    let query = normalize_for_match(&rom.basename);
    match ctx.client.search(Some(ctx.system_id), &query).await {
        Ok((mut candidates, user_quota)) => {
            ctx.quota.record_call();
            if let Some(q) = user_quota {
                ctx.quota.sync_usage(q.requests_today());
            }
            ctx.throttle.on_success(Endpoint::Search).await;

            candidates.truncate(ctx.search_max_results);
            match select_candidate(rom, &candidates, ctx.search_threshold, ctx.interactive) {
                Selection::Auto { index, confidence } => {
                    log::info!(
                        "Search matched '{}' with confidence {confidence:.2}",
                        rom.basename
                    );
                    Ok(Some(candidates.swap_remove(index)))
                }
                Selection::NeedsPrompt(scored) => {
                    let display: Vec<(String, f64)> = scored
                        .iter()
                        .map(|s| {
                            let name = candidates[s.index]
                                .name_for_regions(&["us", "wor", "eu"])
                                .unwrap_or("?")
                                .to_string();
                            (name, s.confidence)
                        })
                        .collect();
                    match ctx
                        .prompts
                        .select_search_candidate(rom.basename.clone(), display)
                        .await
                    {
                        CandidateChoice::Select(i) if i < scored.len() => {
                            Ok(Some(candidates[scored[i].index].clone()))
                        }
                        CandidateChoice::Select(_) | CandidateChoice::Skip => Ok(None),
                        CandidateChoice::Cancel => {
                            ctx.cancel.cancel();
                            Ok(None)
                        }
                    }
                }
                Selection::Unmatched => Ok(None),
            }
        }
        Err(ScrapeError::RateLimit { retry_after }) => {
            ctx.quota.record_call();
            ctx.throttle
                .on_rate_limited(Endpoint::Search, retry_after.map(Duration::from_secs))
                .await;
            Err(ScrapeError::RateLimit { retry_after })
        }
        Err(e) => {
            if e.is_retryable() {
                ctx.quota.record_call();
            }
            Err(e)
        }
    }
}

/// Fetch the needed media types in parallel. Failures degrade softly:
/// the asset is logged and skipped, the catalog keeps a gap.
async fn fetch_media(
    ctx: &PlatformCtx,
    rom: &RomEntity,
    rom_index: usize,
    record: &GameRecord,
    kinds: &[MediaKind],
    media_paths: &mut BTreeMap<MediaKind, PathBuf>,
    media_hashes: &mut BTreeMap<String, String>,
) {
    let prior = ctx.provenance_by_index.get(&rom_index);

    let downloads = kinds.iter().filter_map(|&kind| {
        let item = select_asset(
            record,
            kind,
            &rom.regions,
            &ctx.preferred_regions,
            &ctx.preferred_languages,
        )?;
        let dest = media_dest(
            &ctx.media_root,
            &ctx.platform_name,
            kind,
            &rom.basename,
            &item.format,
        );
        let url = item.url.clone();
        let stored_hash = prior
            .and_then(|p| p.media.get(kind.directory()))
            .cloned();
        Some(async move {
            if dest.is_file() {
                // Re-verify presence: keep the file when policy says so or
                // its content hash still matches provenance.
                if ctx.skip_existing_media {
                    let hash = hash_file(&dest).unwrap_or_default();
                    return (kind, Ok((dest, hash)));
                }
                if let (Ok(hash), Some(stored)) = (hash_file(&dest), stored_hash.as_deref()) {
                    if hash.eq_ignore_ascii_case(stored) {
                        return (kind, Ok((dest, hash)));
                    }
                }
            }
            match ctx.fetcher.fetch(&url, kind, &dest).await {
                Ok(fetched) => (kind, Ok((fetched.path, fetched.hash))),
                Err(e) => (kind, Err(e)),
            }
        })
    });

    for (kind, result) in futures::future::join_all(downloads).await {
        match result {
            Ok((path, hash)) => {
                media_paths.insert(kind, path);
                if !hash.is_empty() {
                    media_hashes.insert(kind.directory().to_string(), hash);
                }
            }
            Err(e) => {
                log::warn!(
                    "Media {} for '{}' failed: {e}",
                    kind.directory(),
                    rom.basename
                );
                ctx.count_error(format!("media {}: {e}", kind.directory()).as_str());
            }
        }
    }
}

/// Build the scraped entry, merge it against the existing catalog entry,
/// and stage the result for the final write.
fn stage_entry(
    ctx: &PlatformCtx,
    rom: &RomEntity,
    rom_index: usize,
    record: &GameRecord,
    media_paths: BTreeMap<MediaKind, PathBuf>,
    media_hashes: BTreeMap<String, String>,
) {
    let regions = ctx.region_chain(rom);
    let languages = ctx.language_chain();

    let mut scraped = GameEntry::new(
        rom.gamelist_path(),
        record
            .name_for_regions(&regions)
            .unwrap_or(&rom.basename)
            .to_string(),
    );
    scraped.provider_id = Some(record.id.clone());
    scraped.desc = record.synopsis_for_languages(&languages).map(String::from);
    scraped.releasedate = record
        .date_for_regions(&regions)
        .map(format_release_date);
    scraped.developer = record.developer.clone();
    scraped.publisher = record.publisher.clone();
    scraped.players = record.players.clone();
    scraped.rating = record.rating;
    if !record.genres.is_empty() {
        scraped.genre = Some(record.genres.join("-"));
    }

    let media_ref = |kind: MediaKind| -> Option<String> {
        media_paths.get(&kind).map(|path| {
            match path.strip_prefix(&ctx.catalog_dir) {
                Ok(rel) => format!("./{}", rel.display()),
                Err(_) => path.display().to_string(),
            }
        })
    };
    scraped.image = media_ref(MediaKind::Cover);
    scraped.thumbnail = media_ref(MediaKind::Screenshot);
    scraped.marquee = media_ref(MediaKind::Marquee);
    scraped.video = media_ref(MediaKind::Video);

    let existing = ctx.existing_by_path.get(&rom.gamelist_path());
    let (merged, report) = merge_entries(existing, &scraped, ctx.merge_policy);
    if let Some(line) = report.summary_line() {
        ctx.change_lines.lock().expect("change lock").push(line);
    }

    let mut provenance = ProvenanceRecord {
        provider_id: Some(record.id.clone()),
        identity_hash: rom.hash.clone(),
        identity_size: Some(rom.size),
        algorithm: Some(ctx.algorithm.as_str().to_string()),
        media: media_hashes,
        updated: Some(Local::now().to_rfc3339()),
    };
    // Keep hashes for media types not touched this run.
    if let Some(prior) = ctx.provenance_by_index.get(&rom_index) {
        for (slug, hash) in &prior.media {
            provenance
                .media
                .entry(slug.clone())
                .or_insert_with(|| hash.clone());
        }
    }

    ctx.staged.lock().expect("staged lock").insert(
        rom.basename.clone(),
        StagedEntry {
            entry: merged,
            provenance,
        },
    );
}
