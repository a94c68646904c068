use resource_cache::{
    logging::init_tracing, CacheConfig, CacheManager, CacheStatistics, ResourceKind,
    ShutdownOutcome, StaticSelection,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const REPORT_INTERVAL: Duration = Duration::from_secs(5);

fn print_stats(kind: ResourceKind, stats: &CacheStatistics) {
    let last_scan = stats
        .last_scan_time
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());
    println!(
        "  {:<9} {:>3} entries (capacity {:>3}) valid={} last scan {}",
        kind.to_string(), stats.count, stats.capacity, stats.valid, last_scan
    );
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <config-file> [font-setting] [animation]", args[0]);
        eprintln!("Resources are read from <config-file dir>/resources/{{fonts,animations}}");
        std::process::exit(1);
    }

    init_tracing(None, "info");

    let config = match CacheConfig::from_config_file(&PathBuf::from(&args[1])) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid config path: {}", e);
            std::process::exit(1);
        }
    };

    let selection = Arc::new(StaticSelection::new());
    selection.set(ResourceKind::Font, args.get(2).cloned());
    selection.set(ResourceKind::Animation, args.get(3).cloned());

    println!("Watching fonts in:      {}", config.font_root.display());
    println!("Watching animations in: {}", config.animation_root.display());
    println!("Add, rename or delete resource files to trigger a refresh. Ctrl+C to exit.");

    let manager = CacheManager::initialize(config, selection, true);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    let mut last_passes = 0;
    let mut ticks = Duration::ZERO;
    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(250));
        ticks += Duration::from_millis(250);

        let passes = manager.scan_passes();
        if passes == last_passes && ticks < REPORT_INTERVAL {
            continue;
        }
        ticks = Duration::ZERO;
        last_passes = passes;

        let stats = manager.statistics();
        println!(
            "[{}] scan passes: {} watcher active: {}",
            chrono::Local::now().format("%H:%M:%S"),
            passes,
            manager.is_watcher_active()
        );
        print_stats(ResourceKind::Font, &stats.fonts);
        print_stats(ResourceKind::Animation, &stats.animations);

        if let Some(current) = manager.fonts().current_entry() {
            println!("  current font: {}", current.relative_path);
        }
        if let Some(current) = manager.animations().current_entry() {
            println!("  current animation: {}", current.file_name);
        }
    }

    println!("\nShutting down...");
    match manager.shutdown() {
        ShutdownOutcome::Abandoned => println!("Scan thread did not stop in time"),
        _ => println!("Done"),
    }
}
