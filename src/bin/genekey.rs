//! genekey CLI — inspect sequences and walk through a credential lifecycle
//!
//! Commands:
//!   genekey analyze   — complexity report for a sequence
//!   genekey translate — codon translation of a sequence
//!   genekey random    — generate a random sequence
//!   genekey config    — print a configuration preset as JSON
//!   genekey demo      — register, authenticate, evolve and ancestor-authenticate

use genekey_core::{
    AuthError, DerivationMode, Engine, EngineConfig, KeyOptions, MemorySink, OsEntropy,
};
use std::env;

fn print_usage() {
    println!(
        r#"
╔══════════════════════════════════════════════════════════════╗
║        genekey v0.1 — Evolving Sequence Credentials          ║
╚══════════════════════════════════════════════════════════════╝

Usage: genekey <command> [options]

Commands:
  analyze    <sequence>                  Complexity analysis
  translate  <sequence>                  Codon translation (frame 0)
  random     [length]                    Random sequence (default 24)
  config     [default|strict|relaxed]    Print a configuration preset
  demo                                   Run the full lifecycle demo

Examples:
  genekey analyze ATGCGTACGTTAGCCATGAC
  genekey translate ATGCTTGCAAAGTGGTAA
  genekey random 32
  genekey config strict
  genekey demo
"#
    );
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return;
    }

    match args[1].as_str() {
        "analyze" => cmd_analyze(&args[2..]),
        "translate" => cmd_translate(&args[2..]),
        "random" => cmd_random(&args[2..]),
        "config" => cmd_config(&args[2..]),
        "demo" => cmd_demo(),
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
        }
    }
}

fn cmd_analyze(args: &[String]) {
    let Some(raw) = args.first() else {
        eprintln!("Usage: genekey analyze <sequence>");
        return;
    };
    let engine = Engine::init(EngineConfig::default());
    match engine.analyze(raw) {
        Ok(a) => {
            println!("  Complexity:      {}", a.complexity);
            println!("  Entropy:         {:.3} bits", a.entropy);
            println!("  GC content:      {:.1}%", a.gc_content * 100.0);
            println!("  Longest repeat:  {}", a.longest_repeat);
            println!("  Palindrome:      {}", if a.has_palindrome { "yes" } else { "no" });
            println!("  Codon diversity: {}", a.codon_diversity);
            for w in &a.warnings {
                println!("  Warning:         {}", w);
            }
            println!("  Acceptable:      {}", if a.acceptable { "yes" } else { "NO" });
        }
        Err(e) => eprintln!("  {}", e),
    }
}

fn cmd_translate(args: &[String]) {
    let Some(raw) = args.first() else {
        eprintln!("Usage: genekey translate <sequence>");
        return;
    };
    let engine = Engine::init(EngineConfig::default());
    match engine.translate(raw) {
        Ok(protein) => println!("  {}", protein),
        Err(e) => eprintln!("  {}", e),
    }
}

fn cmd_random(args: &[String]) {
    let len = match args.first().map(|s| s.parse::<usize>()) {
        None => 24,
        Some(Ok(n)) => n,
        Some(Err(_)) => {
            eprintln!("Usage: genekey random [length]");
            return;
        }
    };
    let mut engine = Engine::builder(EngineConfig::default()).entropy(OsEntropy).build();
    match engine.random_sequence(len) {
        Ok(seq) => println!("  {}", seq),
        Err(e) => eprintln!("  {}", e),
    }
}

fn cmd_config(args: &[String]) {
    let config = match args.first().map(String::as_str) {
        None | Some("default") => EngineConfig::default(),
        Some("strict") => EngineConfig::strict(),
        Some("relaxed") => EngineConfig::relaxed(),
        Some(other) => {
            eprintln!("Unknown preset: {}", other);
            return;
        }
    };
    match config.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("  {}", e),
    }
}

fn cmd_demo() {
    println!(
        r#"
╔══════════════════════════════════════════════════════════════╗
║              genekey — Full Demo                             ║
║     Register + Authenticate + Evolve + Ancestor Auth         ║
╚══════════════════════════════════════════════════════════════╝
"#
    );
    if let Err(e) = run_demo() {
        eprintln!("Demo failed: {}", e);
    }
}

fn run_demo() -> Result<(), AuthError> {
    let sink = MemorySink::new();
    let mut engine = Engine::builder(EngineConfig::default()).sink(sink.clone()).build();

    println!("Step 1: Registering identities...");
    println!("{}", "-".repeat(60));
    let mut draws = 0;
    let alice = loop {
        let candidate = engine.random_sequence(24)?;
        draws += 1;
        match engine.register("alice", &candidate) {
            Ok(()) => break candidate,
            Err(AuthError::LowComplexity(c)) if draws < 10 => {
                println!("  Rejected {} ({} complexity), drawing again", candidate, c);
            }
            Err(e) => return Err(e),
        }
    };
    println!("  {}", engine.key("alice")?.summary());

    let bob = "ATGCTTGCAAAGTGGTCA";
    engine.register_with(
        "bob",
        bob,
        KeyOptions {
            mode: DerivationMode::TranslatedProtein,
            tolerance: 0,
            expires_at: None,
        },
    )?;
    println!("  {}", engine.key("bob")?.summary());

    println!("\nStep 2: Authenticating...");
    println!("{}", "-".repeat(60));
    engine.authenticate("alice", &alice)?;
    println!("  alice with her sequence: OK");
    match engine.authenticate("alice", bob) {
        Err(e) => println!("  alice with bob's sequence: {}", e),
        Ok(()) => println!("  alice with bob's sequence: unexpectedly OK"),
    }
    engine.authenticate("bob", "ATGTTAGCAAAGTGGTCA")?;
    println!("  bob with a synonymous codon: OK (protein mode)");

    println!("\nStep 3: Forced evolution...");
    println!("{}", "-".repeat(60));
    let event = engine.evolve_forced("alice", 3)?;
    println!("  {}", event.describe().replace('\n', "\n  "));
    if let Some(note) = &event.notification {
        println!("  Notification: {}", note);
    }
    let evolved = engine.current_generation("alice")?.sequence.clone();
    println!("  Generation {}: {}", event.to_generation, evolved);

    println!("\nStep 4: Authenticating after evolution...");
    println!("{}", "-".repeat(60));
    match engine.authenticate("alice", &alice) {
        Err(e) => println!("  Original sequence: {}", e),
        Ok(()) => println!("  Original sequence: OK"),
    }
    let (result, detail) = engine.authenticate_ancestor_detail("alice", &alice, 5);
    let back = result?;
    println!(
        "  Ancestor auth: matched {} generation(s) back, trust penalty {:.0}%",
        back,
        detail.penalty * 100.0
    );
    engine.authenticate("alice", &evolved)?;
    println!("  Evolved sequence: OK");
    println!("  Fitness: {:.2}", engine.fitness("alice")?);

    println!("\nStep 5: Audit trail");
    println!("{}", "-".repeat(60));
    for event in sink.events() {
        println!("  {}", event);
    }

    let stats = engine.shutdown();
    println!("\nStats: {:?}", stats);
    Ok(())
}
