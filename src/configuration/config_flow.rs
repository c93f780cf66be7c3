use std::collections::BTreeMap;

use log::{info, warn};
use serde_json::{json, Map, Value};

use super::{
    config_store::{ConfigEntry, ConfigStore, StoreError},
    device_api::{format_mac, DeviceApi, DeviceInfo},
    form::{collect_form, render_fields, FormErrors, FormField},
    main_configuration::*,
    post_data::PostData,
};

/// Outcome of one wizard step.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowResult {
    ShowForm {
        step_id: &'static str,
        fields: Vec<FormField>,
        errors: FormErrors,
        placeholders: BTreeMap<String, String>,
    },
    /// For an options flow `data` holds the new options.
    CreateEntry {
        title: String,
        unique_id: Option<String>,
        data: Map<String, Value>,
        options: Map<String, Value>,
    },
    Abort {
        reason: &'static str,
    },
}

impl FlowResult {
    fn form(step_id: &'static str, fields: Vec<FormField>, errors: FormErrors) -> Self {
        FlowResult::ShowForm {
            step_id,
            fields,
            errors,
            placeholders: BTreeMap::new(),
        }
    }
}

/// A device announced over mDNS.
#[derive(Debug, Clone, Default)]
pub struct ZeroconfInfo {
    pub host: String,
    pub port: u16,
    /// e.g. `smartvanio-rs-4a0afc.local.`
    pub hostname: String,
    pub properties: BTreeMap<String, String>,
}

/// Setup wizard for a new device.
pub struct ConfigFlow<'a> {
    api: &'a dyn DeviceApi,
    host: Option<String>,
    port: Option<u16>,
    noise_psk: Option<String>,
    noise_required: bool,
    name: Option<String>,
    device_name: Option<String>,
    device_info: Option<DeviceInfo>,
    unique_id: Option<String>,
}

impl<'a> ConfigFlow<'a> {
    pub fn new(api: &'a dyn DeviceApi) -> Self {
        Self {
            api,
            host: None,
            port: None,
            noise_psk: None,
            noise_required: false,
            name: None,
            device_name: None,
            device_info: None,
            unique_id: None,
        }
    }

    pub fn set_noise_psk(&mut self, noise_psk: &str) {
        self.noise_psk = Some(noise_psk.to_string()).filter(|psk| !psk.is_empty());
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Entry point when the user adds a device by hand.
    pub fn step_user(&mut self, host: Option<&str>) -> FlowResult {
        match host {
            Some(host) => {
                self.host = Some(host.trim().to_string());
                self.port = Some(DEFAULT_PORT);
                self.try_fetch_device_info()
            }
            None => self.show_user_form(None),
        }
    }

    fn show_user_form(&self, error: Option<&str>) -> FlowResult {
        let mut current = Map::new();
        if let Some(host) = &self.host {
            current.insert(CONF_HOST.to_string(), json!(host));
        }

        let mut errors = FormErrors::new();
        if let Some(error) = error {
            errors.insert("base".to_string(), error.to_string());
        }

        let mut placeholders = BTreeMap::new();
        placeholders.insert("smartvanio_url".to_string(), SMARTVANIO_URL.to_string());

        FlowResult::ShowForm {
            step_id: "user",
            fields: render_fields(MAP_USER_FORM, &current),
            errors,
            placeholders,
        }
    }

    /// Entry point for a device found on the network.
    pub fn step_zeroconf(
        &mut self,
        discovery: &ZeroconfInfo,
        store: &mut ConfigStore,
    ) -> Result<FlowResult, StoreError> {
        let Some(mac) = discovery.properties.get("mac") else {
            return Ok(FlowResult::Abort {
                reason: "mdns_missing_mac",
            });
        };
        let mac = format_mac(mac);

        let device_name = discovery
            .hostname
            .strip_suffix(".local.")
            .unwrap_or(&discovery.hostname)
            .to_string();

        self.name = Some(
            discovery
                .properties
                .get("friendly_name")
                .cloned()
                .unwrap_or_else(|| device_name.clone()),
        );
        self.device_name = Some(device_name);
        self.host = Some(discovery.host.clone());
        self.port = Some(discovery.port);
        self.noise_required = discovery
            .properties
            .get("api_encryption")
            .is_some_and(|v| !v.is_empty());
        self.unique_id = Some(mac.clone());

        if let Some(entry) = store.entry_by_unique_id(&mac) {
            info!("{} is already configured, refreshing its address", mac);
            let entry_id = entry.entry_id.clone();
            let mut data = entry.data.clone();
            data.insert(CONF_HOST.to_string(), json!(discovery.host));
            data.insert(CONF_PORT.to_string(), json!(discovery.port));
            store.update_data(&entry_id, data)?;

            return Ok(FlowResult::Abort {
                reason: "already_configured",
            });
        }

        Ok(self.step_discovery_confirm(false))
    }

    pub fn step_discovery_confirm(&mut self, confirmed: bool) -> FlowResult {
        if confirmed {
            return self.try_fetch_device_info();
        }

        let mut placeholders = BTreeMap::new();
        placeholders.insert(
            "name".to_string(),
            self.name.clone().unwrap_or_default(),
        );

        FlowResult::ShowForm {
            step_id: "discovery_confirm",
            fields: Vec::new(),
            errors: FormErrors::new(),
            placeholders,
        }
    }

    fn try_fetch_device_info(&mut self) -> FlowResult {
        let info = match self.fetch_device_info() {
            Ok(info) => info,
            Err(error) => return self.show_user_form(Some(error)),
        };

        match DeviceType::from_project_name(&info.project_name) {
            DeviceType::ResistiveSensor => self.step_resistive_sensor(None),
            DeviceType::Inclinometer => self.step_inclinometer(None),
            DeviceType::Other => self.create_generic_entry(),
        }
    }

    fn fetch_device_info(&mut self) -> Result<DeviceInfo, &'static str> {
        let host = self.host.clone().unwrap_or_default();
        let port = self.port.unwrap_or(DEFAULT_PORT);

        if self.noise_required && self.noise_psk.is_none() {
            warn!("{} requires an encryption key but none was given", host);
        }

        let info = self
            .api
            .device_info(&host, port, self.noise_psk.as_deref())
            .map_err(|e| {
                warn!("Fetching device info from {}:{} failed: {}", host, port, e);
                e.form_error()
            })?;

        info!(
            "Found {} ({}) running {}",
            info.name, info.mac_address, info.project_name
        );

        self.name = Some(info.display_name().to_string());
        self.device_name = Some(info.name.clone());
        self.unique_id = Some(format_mac(&info.mac_address));
        self.device_info = Some(info.clone());

        Ok(info)
    }

    fn connection_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert(CONF_HOST.to_string(), json!(self.host));
        data.insert(CONF_PORT.to_string(), json!(self.port));
        data.insert(CONF_PASSWORD.to_string(), json!(""));
        data.insert(
            CONF_NOISE_PSK.to_string(),
            json!(self.noise_psk.clone().unwrap_or_default()),
        );
        data
    }

    fn title(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.device_name.clone())
            .unwrap_or_else(|| DOMAIN.to_string())
    }

    /// Names and resistance ranges of both sensors of a resistive module.
    pub fn step_resistive_sensor(&mut self, form: Option<&PostData>) -> FlowResult {
        let Some(form) = form else {
            return FlowResult::form(
                "resistive_sensor",
                render_fields(MAP_RESISTIVE_FORM, &Map::new()),
                FormErrors::new(),
            );
        };

        let sensors = match collect_form(MAP_RESISTIVE_FORM, form, &Map::new()) {
            Ok(sensors) => sensors,
            Err(errors) => {
                return FlowResult::form(
                    "resistive_sensor",
                    render_fields(MAP_RESISTIVE_FORM, &Map::new()),
                    errors,
                )
            }
        };

        let mut data = self.connection_data();
        data.insert(CONF_DEVICE.to_string(), json!(self.device_name));
        data.insert(
            CONF_DEVICE_TYPE.to_string(),
            json!(PROJECT_RESISTIVE_SENSOR),
        );
        data.extend(sensors);
        data.insert(CONF_DEVICE_INFO.to_string(), json!(self.device_info));

        FlowResult::CreateEntry {
            title: self.title(),
            unique_id: self.unique_id.clone(),
            data,
            options: Map::new(),
        }
    }

    pub fn step_inclinometer(&mut self, form: Option<&PostData>) -> FlowResult {
        let Some(form) = form else {
            return FlowResult::form(
                "inclinometer",
                render_fields(MAP_INCLINOMETER_FORM, &Map::new()),
                FormErrors::new(),
            );
        };

        let fields = match collect_form(MAP_INCLINOMETER_FORM, form, &Map::new()) {
            Ok(fields) => fields,
            Err(errors) => {
                return FlowResult::form(
                    "inclinometer",
                    render_fields(MAP_INCLINOMETER_FORM, &Map::new()),
                    errors,
                )
            }
        };

        let mut data = self.connection_data();
        data.insert(CONF_DEVICE.to_string(), json!(self.device_name));
        data.insert(CONF_DEVICE_TYPE.to_string(), json!(PROJECT_INCLINOMETER));
        data.extend(fields);

        FlowResult::CreateEntry {
            title: data
                .get(CONF_NAME)
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| self.title()),
            unique_id: self.unique_id.clone(),
            data,
            options: Map::new(),
        }
    }

    fn create_generic_entry(&self) -> FlowResult {
        let mut data = self.connection_data();
        data.insert(CONF_DEVICE_NAME.to_string(), json!(self.device_name));

        let mut options = Map::new();
        options.insert(
            CONF_ALLOW_SERVICE_CALLS.to_string(),
            json!(DEFAULT_NEW_CONFIG_ALLOW_SERVICE_CALLS),
        );

        FlowResult::CreateEntry {
            title: self.title(),
            unique_id: self.unique_id.clone(),
            data,
            options,
        }
    }
}

/// Revises an existing entry after setup.
pub struct OptionsFlow<'a> {
    entry: &'a ConfigEntry,
}

impl<'a> OptionsFlow<'a> {
    pub fn new(entry: &'a ConfigEntry) -> Self {
        Self { entry }
    }

    fn form_map(&self) -> Vec<&'static MapFormElement> {
        let device_type = self.entry.read_string(CONF_DEVICE_TYPE, "");
        match DeviceType::from_project_name(&device_type) {
            DeviceType::ResistiveSensor => MAP_RESISTIVE_FORM
                .iter()
                .chain(MAP_CALIBRATION_FORM.iter())
                .collect(),
            DeviceType::Inclinometer => MAP_INCLINOMETER_FORM.iter().collect(),
            DeviceType::Other => MAP_SERVICE_CALLS_FORM.iter().collect(),
        }
    }

    pub fn step_init(&self, form: Option<&PostData>) -> FlowResult {
        let map = self.form_map();
        let current = self.entry.merged();

        let Some(form) = form else {
            return FlowResult::form("init", render_map(&map, &current), FormErrors::new());
        };

        let mut options = self.entry.options.clone();
        let mut errors = FormErrors::new();
        for elem in &map {
            match collect_form(std::slice::from_ref(*elem), form, &current) {
                Ok(collected) => merge_slots(&mut options, collected),
                Err(e) => errors.extend(e),
            }
        }

        if !errors.is_empty() {
            return FlowResult::form("init", render_map(&map, &current), errors);
        }

        FlowResult::CreateEntry {
            title: self.entry.title.clone(),
            unique_id: self.entry.unique_id.clone(),
            data: options,
            options: Map::new(),
        }
    }
}

fn render_map(map: &[&MapFormElement], current: &Map<String, Value>) -> Vec<FormField> {
    map.iter()
        .flat_map(|elem| render_fields(std::slice::from_ref(*elem), current))
        .collect()
}

/// Merges collected values into `target`, combining slot objects key by key.
fn merge_slots(target: &mut Map<String, Value>, collected: Map<String, Value>) {
    for (key, value) in collected {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(update)) => existing.extend(update),
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}
