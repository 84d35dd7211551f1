use std::time::Duration;

use istep::generator::{Phase, Variant};
use istep::host::Module;
use tracing_subscriber::EnvFilter;

const QUANTUM: Duration = Duration::from_millis(1);

fn demo_variant(variant: Variant) {
    println!("\n=== {} ===\n", variant.name());
    println!("{}", variant.description());
    println!();

    let mut module = Module::new(variant, QUANTUM);

    println!("Parameters:");
    let params = *module.parameters();
    for descriptor in variant.descriptors() {
        if let Some(value) = params.get(descriptor.id) {
            println!("  {:<28} {}", descriptor.label, value);
        }
    }
    println!("  Quantum: {:?}", QUANTUM);
    println!();

    println!(
        "{:<8} {:<8} {:<6} {:<16} {:<14}",
        "Tick", "Step", "Cycle", "Phase", "Iout"
    );
    println!("{}", "-".repeat(56));

    let mut tick = 0usize;
    let mut last_phase = Phase::Idle;
    let mut last_step = -1i64;

    // Print whenever the phase or the step changes
    while !module.is_complete() {
        let out = module.execute(-0.065);
        let state = *module.engine().state();
        let phase = module.phase();

        if phase != last_phase || state.step != last_step {
            println!(
                "{:<8} {:<8} {:<6} {:<16} {:<14.4e}",
                tick,
                state.step,
                state.cycle,
                phase.as_str(),
                out
            );
            last_phase = phase;
            last_step = state.step;
        }
        tick += 1;

        if tick > 1_000_000 {
            println!("  ... stopping, protocol does not complete");
            break;
        }
    }

    println!(
        "\nCompleted in {} ticks ({:.3}s)",
        tick,
        tick as f64 * QUANTUM.as_secs_f64()
    );

    // Idle value after completion
    println!("Idle output: {:.4e}", module.execute(-0.065));
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    println!("istep: staircase current protocols");
    println!("==================================");

    for variant in Variant::ALL {
        demo_variant(variant);
    }

    println!("\n==================================");
    println!("All demos complete!");
}
