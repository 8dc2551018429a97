//! bczd daemon: command line and conf handling, storage, the tier-two
//! context and the lifecycle of the sync worker.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;

use bczd_chainstate::{ChainIndex, ChainView, CoinsView, UtxoSet};
use bczd_consensus::{chain_params, hash256_to_hex, unix_time, Network};
use bczd_log::{self as logging, log_category, log_info, log_warn, Category};
use bczd_masternode::{
    ActiveMasternode, CacheError, EmptyDeterministicList, MasternodeCache, MasternodeManager,
};
use bczd_spork::{SporkManager, SporkStatus};
use bczd_storage::fjall::FjallStore;
use bczd_storage::memory::MemoryStore;
use bczd_storage::KeyValueStore;
use bczd_tiertwo::config::DEFAULT_DATA_DIR;
use bczd_tiertwo::{
    load_conf_file, spawn_sync_worker, ConfMap, Inventory, Peer, PeerId, PeerSet,
    StorageBackend, TierTwoConfig, TierTwoContext, CONF_FILE_NAME,
};
use fs2::FileExt;
use serde::Serialize;

const DATA_DIR_LOCK_FILE_NAME: &str = ".lock";
const DB_DIR_NAME: &str = "db";

/// Flags taking a value, and the conf key each one overrides.
const VALUE_FLAGS: [(&str, &str); 9] = [
    ("--network", "network"),
    ("--data-dir", "datadir"),
    ("--mn-operator-pubkey", "mnoperatorpubkey"),
    ("--spork-key", "sporkkey"),
    ("--log-level", "loglevel"),
    ("--log-format", "logformat"),
    ("--debug", "debug"),
    ("--sync-tick", "synctick"),
    ("--storage", "storage"),
];

pub struct Options {
    pub config: TierTwoConfig,
    pub conf_path: PathBuf,
    pub print_sporks: bool,
}

pub enum CliAction {
    Run(Options),
    PrintHelp,
    PrintVersion,
}

pub async fn run_entry() -> Result<(), String> {
    match parse_args()? {
        CliAction::PrintHelp => {
            println!("{}", usage());
            Ok(())
        }
        CliAction::PrintVersion => {
            println!("bczd {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliAction::Run(options) => run_with_options(options).await,
    }
}

async fn run_with_options(options: Options) -> Result<(), String> {
    let config = options.config;
    logging::init(logging::LogConfig {
        level: config.log_level,
        format: config.log_format,
        timestamps: config.log_timestamps,
    });
    for category in &config.debug_categories {
        logging::enable_category(*category);
    }
    log_info!(
        "Startup: network={}, storage={:?}, data_dir={}, conf={}",
        config.network.as_str(),
        config.storage,
        config.network_data_dir().display(),
        options.conf_path.display()
    );

    // Headers come from the embedding node; standalone the index stays empty
    // and tier-two sync never gets past the spork phase.
    let chain: Arc<dyn ChainView> = Arc::new(RwLock::new(ChainIndex::new()));

    if options.print_sporks {
        let service = Service::open(&config, chain)?;
        println!(
            "{}",
            spork_report_json(&service.ctx.sporks, config.network, unix_time())?
        );
        return Ok(());
    }

    run_service(&config, chain, Arc::new(DetachedPeers)).await
}

/// Runs the tier-two service until ctrl-c or SIGTERM, then stops the sync
/// worker and writes the masternode cache.
pub async fn run_service(
    config: &TierTwoConfig,
    chain: Arc<dyn ChainView>,
    peers: Arc<dyn PeerSet>,
) -> Result<(), String> {
    let service = Service::open(config, chain)?;
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    let worker = spawn_sync_worker(
        Arc::clone(&service.ctx),
        peers,
        config.sync_tick_secs,
        shutdown_rx,
    )
    .map_err(|err| format!("failed to spawn sync worker: {err}"))?;
    log_info!(
        "Tier-two service running: {}",
        service.ctx.sync.status_string()
    );

    wait_for_shutdown_signal().await;
    log_info!("Signal received; requesting shutdown.");
    let _ = shutdown_tx.send(());
    join_worker(worker).await;
    service.shutdown()
}

async fn join_worker(worker: JoinHandle<()>) {
    match tokio::task::spawn_blocking(move || worker.join()).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => log_warn!("sync worker panicked"),
        Err(err) => log_warn!("failed to join sync worker: {err}"),
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                log_warn!("failed to install SIGTERM handler: {err}");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Everything opened at startup. Dropping it releases the data dir lock.
pub struct Service {
    pub ctx: Arc<TierTwoContext>,
    cache: MasternodeCache,
    fjall: Option<Arc<FjallStore>>,
    _lock: DataDirLock,
}

impl Service {
    pub fn open(config: &TierTwoConfig, chain: Arc<dyn ChainView>) -> Result<Self, String> {
        let params = chain_params(config.network);
        let data_dir = config.network_data_dir();
        fs::create_dir_all(&data_dir).map_err(|err| {
            format!("failed to create data dir {}: {err}", data_dir.display())
        })?;
        let lock = lock_data_dir(&data_dir)?;
        let (store, fjall) = open_store(config.storage, &data_dir)?;

        let sporks = Arc::new(SporkManager::new(&params, Some(Arc::clone(&store))));
        let loaded = sporks
            .load_from_db(unix_time())
            .map_err(|err| format!("failed to load sporks: {err}"))?;
        log_info!("Loaded {loaded} sporks from the database");
        if let Some(secret) = config.spork_key {
            sporks
                .set_private_key(secret)
                .map_err(|err| format!("invalid sporkkey: {err}"))?;
            log_info!("Spork signing key set");
        }

        let coins: Arc<dyn CoinsView> = Arc::new(UtxoSet::new(Arc::clone(&store)));
        let mut manager = MasternodeManager::new(
            &params,
            Arc::clone(&chain),
            Arc::clone(&sporks),
            Arc::new(EmptyDeterministicList),
        );
        if let Some(pubkey) = config.active_operator_key() {
            manager = manager.with_active(Arc::new(ActiveMasternode::new(Some(pubkey))));
        }
        let masternodes = Arc::new(manager);

        let cache = MasternodeCache::new(&data_dir, params.message_start);
        load_cache(&cache, &masternodes);

        let ctx = Arc::new(TierTwoContext::new(
            params,
            chain,
            coins,
            sporks,
            masternodes,
        ));
        Ok(Self {
            ctx,
            cache,
            fjall,
            _lock: lock,
        })
    }

    pub fn cache_path(&self) -> &Path {
        self.cache.path()
    }

    pub fn shutdown(self) -> Result<(), String> {
        log_info!(
            "Shutdown: {}; {}",
            self.ctx.sync.status_string(),
            self.ctx.masternodes
        );
        self.cache.write(&self.ctx.masternodes).map_err(|err| {
            format!("failed to write {}: {err}", self.cache.path().display())
        })?;
        if let Some(fjall) = &self.fjall {
            fjall.persist().map_err(|err| err.to_string())?;
        }
        Ok(())
    }
}

fn load_cache(cache: &MasternodeCache, masternodes: &MasternodeManager) {
    match cache.read(masternodes) {
        Ok(count) => log_info!(
            "Loaded {count} masternodes from {}",
            cache.path().display()
        ),
        Err(CacheError::FileOpen(err)) if err.kind() == ErrorKind::NotFound => {
            log_info!(
                "No masternode cache at {}, starting with an empty list",
                cache.path().display()
            )
        }
        Err(err) => log_warn!(
            "Ignoring masternode cache {}: {err}",
            cache.path().display()
        ),
    }
}

type OpenedStore = (Arc<dyn KeyValueStore>, Option<Arc<FjallStore>>);

fn open_store(backend: StorageBackend, data_dir: &Path) -> Result<OpenedStore, String> {
    match backend {
        StorageBackend::Memory => Ok((Arc::new(MemoryStore::new()), None)),
        StorageBackend::Fjall => {
            let path = data_dir.join(DB_DIR_NAME);
            let store = FjallStore::open(&path)
                .map_err(|err| format!("failed to open {}: {err}", path.display()))?;
            let store = Arc::new(store);
            Ok((Arc::clone(&store) as Arc<dyn KeyValueStore>, Some(store)))
        }
    }
}

struct DataDirLock {
    _file: File,
}

fn lock_data_dir(data_dir: &Path) -> Result<DataDirLock, String> {
    let lock_path = data_dir.join(DATA_DIR_LOCK_FILE_NAME);
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|err| format!("failed to open lock file {}: {err}", lock_path.display()))?;

    match file.try_lock_exclusive() {
        Ok(()) => {
            let _ = file.set_len(0);
            let _ = file.seek(SeekFrom::Start(0));
            let _ = writeln!(file, "pid={}", std::process::id());
            let _ = file.flush();
            Ok(DataDirLock { _file: file })
        }
        Err(err) if err.kind() == ErrorKind::WouldBlock => {
            let mut holder = String::new();
            let _ =
                File::open(&lock_path).and_then(|mut reader| reader.read_to_string(&mut holder));
            let holder = holder.trim();
            let suffix = if holder.is_empty() {
                String::new()
            } else {
                format!(" ({holder})")
            };
            Err(format!(
                "data dir {} is already locked (another bczd instance may be running); lock file {}{suffix}",
                data_dir.display(),
                lock_path.display()
            ))
        }
        Err(err) => Err(format!(
            "failed to lock data dir {} (lock file {}): {err}",
            data_dir.display(),
            lock_path.display()
        )),
    }
}

/// Peer set used while no p2p transport is attached.
pub struct DetachedPeers;

impl PeerSet for DetachedPeers {
    fn connected_peers(&self) -> Vec<Arc<dyn Peer>> {
        Vec::new()
    }

    fn relay_inventory(&self, inv: Inventory) {
        log_category!(
            Category::Net,
            "no peers to relay {:?} {}",
            inv.kind,
            hash256_to_hex(&inv.hash)
        );
    }

    fn misbehaving(&self, peer: PeerId, score: u32, reason: &str) {
        log_warn!("peer {peer} misbehaving ({score}): {reason}");
    }
}

#[derive(Serialize)]
struct SporkReport {
    network: &'static str,
    sporks: Vec<SporkStatus>,
}

pub fn spork_report_json(
    sporks: &SporkManager,
    network: Network,
    now: i64,
) -> Result<String, String> {
    let report = SporkReport {
        network: network.as_str(),
        sporks: sporks.status(now),
    };
    serde_json::to_string_pretty(&report).map_err(|err| err.to_string())
}

fn parse_args() -> Result<CliAction, String> {
    parse_args_from(std::env::args())
}

pub fn parse_args_from<I>(raw_args: I) -> Result<CliAction, String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = raw_args.into_iter().skip(1).peekable();
    if let Some(command) = args.peek() {
        match command.as_str() {
            "help" => return Ok(CliAction::PrintHelp),
            "version" => return Ok(CliAction::PrintVersion),
            _ => {}
        }
    }

    let mut cli = ConfMap::new();
    let mut conf_path: Option<PathBuf> = None;
    let mut print_sporks = false;
    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => {
                (flag.to_string(), Some(value.to_string()))
            }
            _ => (arg, None),
        };
        match flag.as_str() {
            "--help" | "-h" => return Ok(CliAction::PrintHelp),
            "--version" | "-V" => return Ok(CliAction::PrintVersion),
            "--conf" => {
                let value = flag_value(&flag, inline, &mut args)?;
                conf_path = Some(PathBuf::from(value));
            }
            "--masternode" => set(&mut cli, "masternode", "1"),
            "--testnet" => set(&mut cli, "network", "test"),
            "--regtest" => set(&mut cli, "network", "regtest"),
            "--no-log-timestamps" => set(&mut cli, "logtimestamps", "0"),
            "--print-sporks" => print_sporks = true,
            other => {
                let Some((_, key)) = VALUE_FLAGS.iter().find(|(name, _)| *name == other) else {
                    return Err(format!("unknown option '{other}'\n{}", usage()));
                };
                let value = flag_value(&flag, inline, &mut args)?;
                set(&mut cli, key, &value);
            }
        }
    }

    let data_dir = cli
        .get("datadir")
        .and_then(|values| values.last())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let explicit_conf = conf_path.is_some();
    let conf_path = conf_path.unwrap_or_else(|| data_dir.join(CONF_FILE_NAME));
    let conf = load_conf_file(&conf_path).map_err(|err| err.to_string())?;
    if conf.is_none() && explicit_conf {
        return Err(format!("config file {} not found", conf_path.display()));
    }

    let config = TierTwoConfig::from_sources(conf.as_ref(), &cli)
        .map_err(|err| format!("{err}\n{}", usage()))?;
    Ok(CliAction::Run(Options {
        config,
        conf_path,
        print_sporks,
    }))
}

fn flag_value<I>(
    flag: &str,
    inline: Option<String>,
    args: &mut std::iter::Peekable<I>,
) -> Result<String, String>
where
    I: Iterator<Item = String>,
{
    match inline {
        Some(value) => Ok(value),
        None => args
            .next()
            .ok_or_else(|| format!("missing value for {flag}\n{}", usage())),
    }
}

fn set(cli: &mut ConfMap, key: &str, value: &str) {
    cli.entry(key.to_string())
        .or_default()
        .push(value.to_string());
}

fn usage() -> String {
    [
        "Usage:",
        "  bczd [options]",
        "  bczd <command>",
        "",
        "Commands:",
        "  help     Print this help and exit",
        "  version  Print version and exit",
        "",
        "Options:",
        "  --help, -h               Print this help and exit",
        "  --version, -V            Print version and exit",
        "  --conf <path>            Config file (default: <data-dir>/bczd.conf)",
        "  --data-dir <path>        Base data directory (default: ./data)",
        "  --network <name>         main|test|regtest (default: main)",
        "  --testnet, --regtest     Shorthand for --network",
        "  --storage <backend>      fjall|memory (default: fjall)",
        "  --masternode             Run as a masternode (needs --mn-operator-pubkey)",
        "  --mn-operator-pubkey <hex>  Operator public key of this masternode",
        "  --spork-key <hex>        Spork signing secret",
        "  --sync-tick <secs>       Seconds between tier-two sync steps (default: 5)",
        "  --log-level <level>      error|warn|info|debug|trace (default: info)",
        "  --log-format <format>    text|json (default: text)",
        "  --no-log-timestamps      Omit timestamps from log lines",
        "  --debug <categories>     Comma list of masternode,sporks,mnsync,net or all",
        "  --print-sporks           Print the spork table as JSON and exit",
        "",
        "Every option can also be set in the config file as key=value,",
        "e.g. network=test, synctick=10, debug=masternode.",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("bczd")
            .chain(list.iter().copied())
            .map(str::to_string)
            .collect()
    }

    fn run_options(list: &[&str]) -> Options {
        match parse_args_from(args(list)).expect("parse") {
            CliAction::Run(options) => options,
            _ => panic!("expected run action"),
        }
    }

    #[test]
    fn help_and_version() {
        assert!(matches!(
            parse_args_from(args(&["help"])),
            Ok(CliAction::PrintHelp)
        ));
        assert!(matches!(
            parse_args_from(args(&["--regtest", "-h"])),
            Ok(CliAction::PrintHelp)
        ));
        assert!(matches!(
            parse_args_from(args(&["-V"])),
            Ok(CliAction::PrintVersion)
        ));
    }

    #[test]
    fn flags_override_the_conf_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join(CONF_FILE_NAME),
            "network=test\nsynctick=7\nstorage=memory\ndebug=masternode\n",
        )
        .expect("write conf");
        let data_dir = dir.path().to_string_lossy().to_string();

        let options = run_options(&[
            "--data-dir",
            &data_dir,
            "--sync-tick=3",
            "--debug",
            "sporks",
        ]);
        let config = options.config;
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.sync_tick_secs, 3);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.data_dir, dir.path());
        assert_eq!(config.debug_categories.len(), 2);
        assert_eq!(options.conf_path, dir.path().join(CONF_FILE_NAME));
    }

    #[test]
    fn bad_arguments_are_reported() {
        let unknown = parse_args_from(args(&["--mempool"])).err().expect("error");
        assert!(unknown.starts_with("unknown option '--mempool'"));

        let missing = parse_args_from(args(&["--network"])).err().expect("error");
        assert!(missing.starts_with("missing value for --network"));

        let dir = tempfile::tempdir().expect("tempdir");
        let conf = dir.path().join("absent.conf");
        let absent = parse_args_from(args(&["--conf", &conf.to_string_lossy()]))
            .err()
            .expect("error");
        assert!(absent.contains("not found"));

        let invalid = parse_args_from(args(&["--storage", "rocks"])).err().expect("error");
        assert!(invalid.starts_with("invalid value 'rocks' for storage"));
    }

    fn regtest_memory_config(dir: &Path) -> TierTwoConfig {
        TierTwoConfig {
            network: Network::Regtest,
            data_dir: dir.to_path_buf(),
            storage: StorageBackend::Memory,
            ..TierTwoConfig::default()
        }
    }

    fn empty_chain() -> Arc<dyn ChainView> {
        Arc::new(RwLock::new(ChainIndex::new()))
    }

    #[test]
    fn service_writes_the_cache_and_releases_the_lock() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = regtest_memory_config(dir.path());

        let service = Service::open(&config, empty_chain()).expect("open");
        let second = Service::open(&config, empty_chain());
        assert!(matches!(second, Err(err) if err.contains("already locked")));

        let cache_path = service.cache_path().to_path_buf();
        assert_eq!(cache_path, dir.path().join("regtest").join("mncache.dat"));
        service.shutdown().expect("shutdown");
        assert!(cache_path.exists());

        let reopened = Service::open(&config, empty_chain()).expect("reopen");
        assert!(reopened.ctx.masternodes.is_empty());
    }

    #[test]
    fn spork_report_lists_every_spork() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service =
            Service::open(&regtest_memory_config(dir.path()), empty_chain()).expect("open");
        let json = spork_report_json(&service.ctx.sporks, Network::Regtest, unix_time())
            .expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(value["network"], "regtest");
        let sporks = value["sporks"].as_array().expect("array");
        assert!(sporks
            .iter()
            .any(|spork| spork["name"] == "SPORK_21_MASTERNODE_PAYMENT_ENFORCEMENT"));
    }
}
