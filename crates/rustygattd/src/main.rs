//! Heart Rate GATT application
//!
//! Registers the Heart Rate profile on an in-process bus and prints the
//! resulting object tree. Set `RUST_LOG=debug` to follow every request.

use std::sync::Arc;

use log::{error, info};
use rustygatt::profiles::heart_rate::HEART_RATE;
use rustygatt::{Arg, GattApplication, LocalBus, ServerConfig};

fn describe(arg: &Arg) -> String {
    match arg {
        Arg::Byte(b) => format!("0x{:02x}", b),
        Arg::Bool(b) => b.to_string(),
        Arg::Str(s) => format!("{:?}", s),
        Arg::ObjectPath(path) => path.to_string(),
        Arg::Bytes(bytes) => format!("[{}]", hex::encode(bytes)),
        Arg::Array(items) => {
            let items: Vec<String> = items.iter().map(describe).collect();
            format!("[{}]", items.join(", "))
        }
        Arg::Dict(entries) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(key, value)| format!("{}: {}", key, describe(value)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let bus = Arc::new(LocalBus::new());
    let app = GattApplication::new(ServerConfig::default(), bus.clone()).with_sink(Arc::new(
        |bytes: &[u8], len: usize| {
            info!("Value written ({} byte(s)): {}", len, hex::encode(bytes));
        },
    ));

    let service = app.register_profile(&HEART_RATE)?;
    info!("Heart Rate service at {}", service);

    for (path, object) in app.managed_objects()? {
        info!("{} ({})", path, object.interface);
        for (name, value) in &object.properties {
            info!("    {} = {}", name, describe(value));
        }
    }

    app.unregister_service(&service);
    info!("{} object(s) still exported", bus.exported().len());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}
