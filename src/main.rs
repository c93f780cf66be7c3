use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::info;
use serde_json::json;

use smartvanio::{
    configuration::{
        config_flow::{ConfigFlow, FlowResult, OptionsFlow, ZeroconfInfo},
        config_store::ConfigStore,
        device_api::FileDeviceApi,
        main_configuration::DEFAULT_PORT,
        post_data::PostData,
    },
    sensors::{
        calibrated_sensor::CalibratedSensor,
        esphome_sensor::{EsphomeSensor, EsphomeStateClass, LastResetType},
        Sensors,
    },
    interpolate, CalibrationTable, InterpolationMethod,
};

#[derive(Parser)]
#[command(version, about = "Calibrated sensors for SmartVan.io devices")]
struct Cli {
    /// Configuration store
    #[arg(short, long, default_value = "smartvanio.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Map raw values through a calibration table
    Interpolate {
        /// e.g. [[0,1],[2,20],[3,40]]
        #[arg(short, long)]
        table: String,

        #[arg(short, long, default_value = "linear")]
        method: String,

        #[arg(allow_negative_numbers = true)]
        values: Vec<f64>,
    },

    /// Add a device by address
    Setup {
        #[arg(long)]
        host: String,

        /// Device description as the device API reports it (JSON)
        #[arg(long)]
        device: PathBuf,

        #[arg(long)]
        noise_psk: Option<String>,

        /// Url-encoded answers to the device form
        #[arg(long, default_value = "")]
        form: String,
    },

    /// Add a device announced over mDNS
    Discover {
        #[arg(long)]
        host: String,

        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        #[arg(long)]
        hostname: String,

        /// TXT record property, key=value
        #[arg(long = "property", value_parser = parse_property)]
        properties: Vec<(String, String)>,

        #[arg(long)]
        device: PathBuf,

        #[arg(long)]
        confirm: bool,

        #[arg(long, default_value = "")]
        form: String,
    },

    /// Revise an entry's options
    Options {
        entry_id: String,

        /// Url-encoded answers; shows the form when omitted
        #[arg(long)]
        form: Option<String>,
    },

    /// Replace the calibration table of an entry
    Calibrate {
        entry_id: String,

        #[arg(short, long)]
        table: String,
    },

    /// Print the raw and calibrated state of an entry
    State {
        entry_id: String,

        #[arg(long, allow_negative_numbers = true)]
        raw: String,

        #[arg(long, default_value_t = 1)]
        accuracy: usize,

        /// Unit the device reports for the raw sensor
        #[arg(long, default_value = "")]
        raw_unit: String,

        /// none, measurement, total_increasing or total
        #[arg(long, default_value = "measurement", value_parser = str::parse::<EsphomeStateClass>)]
        state_class: EsphomeStateClass,

        /// none, never or auto
        #[arg(long, default_value = "none", value_parser = str::parse::<LastResetType>)]
        last_reset: LastResetType,

        #[arg(long)]
        json: bool,
    },

    /// List configured entries
    Show,
}

fn parse_property(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {}", s))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Interpolate {
            table,
            method,
            values,
        } => {
            let table = CalibrationTable::try_parse(&table).context("Invalid calibration table")?;
            let method: InterpolationMethod = method.parse()?;

            for value in values {
                match interpolate(Some(value), &table, method) {
                    Some(calibrated) => println!("{} -> {}", value, calibrated),
                    None => println!("{} -> unknown", value),
                }
            }
        }

        Command::Setup {
            host,
            device,
            noise_psk,
            form,
        } => {
            let mut store = open_store(&cli.config)?;
            let api = FileDeviceApi::new(device);
            let mut flow = ConfigFlow::new(&api);
            if let Some(psk) = noise_psk {
                flow.set_noise_psk(&psk);
            }

            let result = flow.step_user(Some(&host));
            let result = submit_device_form(&mut flow, result, &form);
            finish_flow(result, &mut store)?;
        }

        Command::Discover {
            host,
            port,
            hostname,
            properties,
            device,
            confirm,
            form,
        } => {
            let mut store = open_store(&cli.config)?;
            let api = FileDeviceApi::new(device);
            let mut flow = ConfigFlow::new(&api);

            let discovery = ZeroconfInfo {
                host,
                port,
                hostname,
                properties: properties.into_iter().collect(),
            };

            let result = flow.step_zeroconf(&discovery, &mut store)?;
            let result = match result {
                FlowResult::ShowForm {
                    step_id: "discovery_confirm",
                    ..
                } if confirm => {
                    let result = flow.step_discovery_confirm(true);
                    submit_device_form(&mut flow, result, &form)
                }
                other => other,
            };

            store.save()?;
            finish_flow(result, &mut store)?;
        }

        Command::Options { entry_id, form } => {
            let mut store = open_store(&cli.config)?;
            let entry = store
                .entry(&entry_id)
                .with_context(|| format!("No entry {}", entry_id))?
                .clone();

            let form = form.map(|f| PostData::from_string(&f));
            match OptionsFlow::new(&entry).step_init(form.as_ref()) {
                FlowResult::CreateEntry { data: options, .. } => {
                    store.update_options(&entry_id, options)?;
                    store.save()?;
                    info!("Options of {} updated", entry_id);
                }
                other => print_flow_result(&other)?,
            }
        }

        Command::Calibrate { entry_id, table } => {
            let mut store = open_store(&cli.config)?;
            let table = CalibrationTable::try_parse(&table).context("Invalid calibration table")?;
            let mut sensor = calibrated_sensor(&store, &entry_id)?;

            sensor.update_calibration(table, &mut store)?;
            store.save()?;
            println!("{}", sensor.table());
        }

        Command::State {
            entry_id,
            raw,
            accuracy,
            raw_unit,
            state_class,
            last_reset,
            json,
        } => {
            let store = open_store(&cli.config)?;
            let sensor = calibrated_sensor(&store, &entry_id)?;

            let mut states = HashMap::new();
            states.insert(sensor.raw_sensor_id().to_string(), raw);

            let mut sensors = Sensors::new();
            sensors.add(
                EsphomeSensor::new(sensor.raw_sensor_id(), "Raw sensor value", accuracy)
                    .with_unit(&raw_unit)
                    .with_state_class(state_class, last_reset),
            );
            sensors.add(sensor);

            if json {
                println!("{}", serde_json::to_string_pretty(&sensors.to_json(&states))?);
            } else {
                println!("{}", sensors.pretty_print(&states));
            }
        }

        Command::Show => {
            let store = open_store(&cli.config)?;
            for entry in store.entries() {
                println!(
                    "{} {} ({})",
                    entry.entry_id,
                    entry.title,
                    entry.unique_id.as_deref().unwrap_or("-")
                );
                if let Ok(sensor) = CalibratedSensor::from_entry(entry) {
                    if !sensor.table().is_empty() {
                        println!("{}", sensor.table());
                    }
                }
            }
        }
    }

    Ok(())
}

fn open_store(path: &Path) -> anyhow::Result<ConfigStore> {
    ConfigStore::open(path)
        .with_context(|| format!("Failed to open configuration {}", path.display()))
}

fn calibrated_sensor(store: &ConfigStore, entry_id: &str) -> anyhow::Result<CalibratedSensor> {
    let entry = store
        .entry(entry_id)
        .with_context(|| format!("No entry {}", entry_id))?;
    CalibratedSensor::from_entry(entry)
        .with_context(|| format!("Entry {} has an invalid calibration", entry_id))
}

/// Answers the device specific step, if the flow reached one.
fn submit_device_form(flow: &mut ConfigFlow, result: FlowResult, form: &str) -> FlowResult {
    let form = PostData::from_string(form);
    match result {
        FlowResult::ShowForm {
            step_id: "resistive_sensor",
            ..
        } => flow.step_resistive_sensor(Some(&form)),
        FlowResult::ShowForm {
            step_id: "inclinometer",
            ..
        } => flow.step_inclinometer(Some(&form)),
        other => other,
    }
}

fn finish_flow(result: FlowResult, store: &mut ConfigStore) -> anyhow::Result<()> {
    match result {
        FlowResult::CreateEntry {
            title,
            unique_id,
            data,
            options,
        } => {
            let entry_id = store
                .add_entry(&title, unique_id, data, options)?
                .entry_id
                .clone();
            store.save()?;
            println!("Created {} ({})", entry_id, title);
            Ok(())
        }
        FlowResult::Abort { reason } => bail!("Setup aborted: {}", reason),
        other => print_flow_result(&other),
    }
}

fn print_flow_result(result: &FlowResult) -> anyhow::Result<()> {
    if let FlowResult::ShowForm {
        step_id,
        fields,
        errors,
        placeholders,
    } = result
    {
        let form = json!({
            "step_id": step_id,
            "fields": fields,
            "errors": errors,
            "placeholders": placeholders,
        });
        println!("{}", serde_json::to_string_pretty(&form)?);
    }
    Ok(())
}
