//! Headless probe. Creates a context without any window, logs every adapter
//! the instance sees and which queue the bootstrap would run on.
use vklab::context::Ctx;
use vklab::report;

fn main() -> Result<(), anyhow::Error> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .unwrap();

    let context = Ctx::new_headless(false)?;
    report::log_adapters(&context.instance)?;

    let queue = context.queue();
    log::info!(
        "Bootstrap selected queue family {} ({:?})",
        queue.family_index,
        queue.properties.queue_flags
    );
    Ok(())
}
