pub mod config;
pub mod devices;
pub mod errors;
pub mod handler;
pub mod identity;
pub mod metrics_defs;
pub mod params;
pub mod protocol;
pub mod push;
mod service;
#[cfg(test)]
mod testutils;

use config::DeviceStoreConfig;
use devices::{DevicePool, DeviceStore, HttpDeviceStore, StaticDeviceStore};
use errors::DispatchError;
use handler::LinkDispatchHandler;
use identity::HeaderIdentityProvider;
use push::C2dmTransport;
use service::DispatchService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub async fn run(config: config::Config) -> Result<(), DispatchError> {
    config.validate()?;

    let store = build_device_store(&config.device_store)?;
    let devices = DevicePool::new(store, config.max_store_sessions);
    let identity = HeaderIdentityProvider::new(&config.identity)?;
    let transport = C2dmTransport::new(&config.push);

    let handler =
        LinkDispatchHandler::new(Arc::new(identity), devices.clone(), Arc::new(transport));
    let dispatch_service = DispatchService::new(handler, &config.endpoint_path);
    let admin_service = AdminService::<_, DispatchError>::new(move || devices.is_ready());

    let dispatch_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        dispatch_service,
    );
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    tokio::try_join!(dispatch_task, admin_task)?;
    Ok(())
}

fn build_device_store(config: &DeviceStoreConfig) -> Result<Arc<dyn DeviceStore>, DispatchError> {
    let store: Arc<dyn DeviceStore> = match config {
        DeviceStoreConfig::Filesystem { path } => {
            Arc::new(StaticDeviceStore::from_file(Path::new(path))?)
        }
        DeviceStoreConfig::Static { devices } => Arc::new(StaticDeviceStore::new(devices.clone())?),
        DeviceStoreConfig::Http { url, timeout_secs } => Arc::new(HttpDeviceStore::new(
            url.clone(),
            Duration::from_secs(*timeout_secs),
        )),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::DeviceRecord;
    use std::io::Write;

    #[tokio::test]
    async fn test_build_device_store() {
        let store = build_device_store(&DeviceStoreConfig::Static {
            devices: vec![DeviceRecord {
                owner_identity: "alice@example.com".into(),
                registration_id: "reg-alice".into(),
                debug: false,
            }],
        })
        .unwrap();
        assert!(store.find_device("alice@example.com").await.unwrap().is_some());

        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "[]").expect("write devices");
        let store = build_device_store(&DeviceStoreConfig::Filesystem {
            path: tmp.path().to_str().unwrap().into(),
        })
        .unwrap();
        assert!(store.find_device("alice@example.com").await.unwrap().is_none());

        assert!(matches!(
            build_device_store(&DeviceStoreConfig::Filesystem {
                path: "/nonexistent/devices.json".into(),
            }),
            Err(DispatchError::DeviceStore(_))
        ));
    }
}
