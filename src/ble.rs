//! BLE discovery and the write characteristic of service `0xff00`.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::printer::Connector;
use crate::transport::Channel;

/// Primary service carrying the printer's write characteristic.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x0000ff00_0000_1000_8000_00805f9b34fb);

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub id: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

fn peripheral_id(peripheral: &Peripheral) -> String {
    format!("{:?}", peripheral.id())
}

async fn first_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    match manager.adapters().await?.into_iter().next() {
        Some(adapter) => Ok(adapter),
        None => {
            warn!("no bluetooth adapter available");
            Err(Error::NoWritableEndpoint)
        }
    }
}

fn scan_filter() -> ScanFilter {
    ScanFilter {
        services: vec![SERVICE_UUID],
    }
}

async fn advertises_service(peripheral: &Peripheral) -> Result<bool> {
    Ok(peripheral
        .properties()
        .await?
        .map(|p| p.services.contains(&SERVICE_UUID))
        .unwrap_or(false))
}

/// Scans for `timeout` and lists printers advertising the label service.
pub async fn scan(timeout: Duration) -> Result<Vec<DeviceInfo>> {
    let central = first_adapter().await?;
    central.start_scan(scan_filter()).await?;
    tokio::time::sleep(timeout).await;
    central.stop_scan().await?;

    let mut devices = Vec::new();
    for peripheral in central.peripherals().await? {
        let Some(props) = peripheral.properties().await? else {
            continue;
        };
        // some backends ignore the scan filter
        if !props.services.contains(&SERVICE_UUID) {
            continue;
        }
        devices.push(DeviceInfo {
            id: peripheral_id(&peripheral),
            name: props.local_name,
            rssi: props.rssi,
        });
    }
    info!("scan found {} printer(s)", devices.len());
    Ok(devices)
}

async fn is_wanted(peripheral: &Peripheral, wanted: Option<&str>) -> Result<bool> {
    match wanted {
        Some(id) => Ok(peripheral_id(peripheral) == id),
        None => advertises_service(peripheral).await,
    }
}

/// Waits for a peripheral with id `wanted`, or the first one advertising the
/// label service when `wanted` is `None`.
async fn wait_for_peripheral(central: &Adapter, wanted: Option<&str>) -> Result<Peripheral> {
    let mut events = central.events().await?;
    for peripheral in central.peripherals().await? {
        if is_wanted(&peripheral, wanted).await? {
            return Ok(peripheral);
        }
    }
    while let Some(event) = events.next().await {
        if let CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) = event {
            let peripheral = central.peripheral(&id).await?;
            if is_wanted(&peripheral, wanted).await? {
                return Ok(peripheral);
            }
        }
    }
    Err(Error::NoWritableEndpoint)
}

/// Picks the write endpoint among `(service, properties)` candidates.
///
/// Only characteristics of [`SERVICE_UUID`] qualify. Write-without-response
/// is preferred, plain write is the fallback.
fn pick_writable<T>(
    candidates: impl IntoIterator<Item = T>,
    key: impl Fn(&T) -> (Uuid, CharPropFlags),
) -> Option<(T, WriteType)> {
    let mut fallback = None;
    for candidate in candidates {
        let (service, props) = key(&candidate);
        if service != SERVICE_UUID {
            continue;
        }
        if props.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE) {
            return Some((candidate, WriteType::WithoutResponse));
        }
        if fallback.is_none() && props.contains(CharPropFlags::WRITE) {
            fallback = Some((candidate, WriteType::WithResponse));
        }
    }
    fallback
}

/// Connected printer endpoint.
pub struct BleChannel {
    peripheral: Peripheral,
    characteristic: Characteristic,
    write_type: WriteType,
}

impl BleChannel {
    /// Connects and picks the write characteristic. The peripheral is
    /// disconnected again if any step fails.
    async fn open(peripheral: Peripheral, timeout: Duration) -> Result<Self> {
        let (characteristic, write_type) = match attach(&peripheral, timeout).await {
            Ok(endpoint) => endpoint,
            Err(err) => {
                release(&peripheral).await;
                return Err(err);
            }
        };
        info!(
            "connected to {}, writing {} ({:?})",
            peripheral_id(&peripheral),
            characteristic.uuid,
            write_type
        );
        Ok(Self {
            peripheral,
            characteristic,
            write_type,
        })
    }
}

async fn attach(peripheral: &Peripheral, timeout: Duration) -> Result<(Characteristic, WriteType)> {
    tokio::time::timeout(timeout, peripheral.connect())
        .await
        .map_err(|_| Error::Timeout(timeout))??;
    peripheral.discover_services().await?;
    pick_writable(peripheral.characteristics(), |c| (c.service_uuid, c.properties))
        .ok_or(Error::NoWritableEndpoint)
}

async fn release(peripheral: &Peripheral) {
    if let Err(err) = peripheral.disconnect().await {
        warn!("disconnecting {} failed: {}", peripheral_id(peripheral), err);
    }
}

#[async_trait]
impl Channel for BleChannel {
    async fn write_without_response(&mut self, data: &[u8]) -> Result<()> {
        self.peripheral
            .write(&self.characteristic, data, self.write_type)
            .await?;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn close(&mut self) -> Result<()> {
        debug!("disconnecting {}", peripheral_id(&self.peripheral));
        self.peripheral.disconnect().await?;
        Ok(())
    }
}

/// Connects to the printer with id `id` (as reported by [`scan`]).
pub async fn connect(id: &str, timeout: Duration) -> Result<BleChannel> {
    connect_matching(Some(id), timeout).await
}

/// Connects to the first printer seen advertising the label service.
pub async fn connect_first(timeout: Duration) -> Result<BleChannel> {
    connect_matching(None, timeout).await
}

async fn connect_matching(wanted: Option<&str>, timeout: Duration) -> Result<BleChannel> {
    let central = first_adapter().await?;
    central.start_scan(scan_filter()).await?;
    let found = tokio::time::timeout(timeout, wait_for_peripheral(&central, wanted)).await;
    central.stop_scan().await?;
    let peripheral = match found {
        Ok(found) => found?,
        Err(_) => {
            debug!("no printer matching {:?} within {:?}", wanted, timeout);
            return Err(Error::NoWritableEndpoint);
        }
    };
    BleChannel::open(peripheral, timeout).await
}

/// [`Connector`] over BLE, for [`crate::LabelPrinter::print`].
#[derive(Debug, Clone)]
pub struct BleConnector {
    device_id: Option<String>,
    timeout: Duration,
}

impl BleConnector {
    /// Uses whichever printer shows up first.
    pub fn any(timeout: Duration) -> Self {
        Self {
            device_id: None,
            timeout,
        }
    }

    pub fn device(id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            device_id: Some(id.into()),
            timeout,
        }
    }
}

#[async_trait]
impl Connector for BleConnector {
    type Channel = BleChannel;

    async fn connect(&mut self) -> Result<BleChannel> {
        connect_matching(self.device_id.as_deref(), self.timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OTHER: Uuid = Uuid::from_u128(0x0000180a_0000_1000_8000_00805f9b34fb);

    fn pick(candidates: Vec<(&'static str, Uuid, CharPropFlags)>) -> Option<(&'static str, WriteType)> {
        pick_writable(candidates, |c| (c.1, c.2)).map(|(c, w)| (c.0, w))
    }

    #[test]
    fn service_uuid_is_ff00() {
        assert_eq!(
            SERVICE_UUID.to_string(),
            "0000ff00-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn prefers_write_without_response() {
        let picked = pick(vec![
            ("notify", SERVICE_UUID, CharPropFlags::NOTIFY),
            ("write", SERVICE_UUID, CharPropFlags::WRITE),
            ("wwr", SERVICE_UUID, CharPropFlags::WRITE_WITHOUT_RESPONSE),
        ]);
        assert_eq!(picked, Some(("wwr", WriteType::WithoutResponse)));
    }

    #[test]
    fn falls_back_to_plain_write() {
        let picked = pick(vec![
            ("read", SERVICE_UUID, CharPropFlags::READ),
            ("write", SERVICE_UUID, CharPropFlags::WRITE),
        ]);
        assert_eq!(picked, Some(("write", WriteType::WithResponse)));
    }

    #[test]
    fn ignores_other_services() {
        let picked = pick(vec![
            ("foreign", OTHER, CharPropFlags::WRITE_WITHOUT_RESPONSE),
            ("read", SERVICE_UUID, CharPropFlags::READ),
        ]);
        assert_eq!(picked, None);
    }
}
