use flex_core::{Error, Flavor, Instance, InstanceId, LxcOptions, NetworkInterface, SecurityMode};
use flex_driver::*;
use flex_security::{IdMap, MetadataPolicy};
use std::fs;
use std::sync::Arc;

struct Host {
    _dir: tempfile::TempDir,
    options: LxcOptions,
}

fn host() -> Host {
    let dir = tempfile::tempdir().unwrap();
    let templates = dir.path().join("templates");
    fs::create_dir_all(&templates).unwrap();
    fs::write(templates.join("lxc-ubuntu"), "#!/bin/sh\n").unwrap();

    let options = LxcOptions::default()
        .with_template_dir(&templates)
        .with_instances_path(dir.path().join("instances"));

    Host { _dir: dir, options }
}

fn containers(host: &Host) -> LocalContainers<MockRuntime> {
    LocalContainers::new(
        MockRuntime::new(),
        host.options.clone(),
        Arc::new(MetadataPolicy::new(SecurityMode::Unprivileged)),
        IdMap::default_unprivileged(),
    )
}

fn instance() -> Instance {
    Instance::new(InstanceId::new("abc-123").unwrap(), Flavor::new(512, 1))
}

#[tokio::test]
async fn test_init_creates_instances_path() {
    let host = host();
    let containers = containers(&host);

    containers.init().await.unwrap();
    assert!(host.options.instances_path.is_dir());
}

#[tokio::test]
async fn test_spawn_writes_config_and_starts() {
    let host = host();
    let containers = containers(&host);
    let inst = instance();
    let vifs = [NetworkInterface::new("0123456789abcdef", "ovs", "aa:bb:cc:dd:ee:ff", "br-int")];
    let volume = BlockDevice {
        connection_info: ConnectionInfo::local("/dev/sdb"),
        mount_device: "/mnt/data".to_string(),
    };

    containers.spawn(&inst, &vifs, &[volume]).await.unwrap();

    let config = fs::read_to_string(containers.paths().config(&inst.id)).unwrap();
    assert!(config.starts_with("lxc.include = /usr/share/lxc/config/ubuntu.common.conf\n"));
    assert!(config.contains("lxc.network.link = qbr0123456789a\n"));
    assert!(config.contains("lxc.id_map = u 0 100000 65536\n"));

    assert_eq!(
        containers.runtime().calls().await,
        vec![
            RuntimeCall::Start(inst.id.clone()),
            RuntimeCall::AddDevice(inst.id.clone(), "/dev/sdb".into(), "/mnt/data".into()),
        ]
    );
    assert_eq!(containers.state(&inst.id).await.unwrap(), ContainerState::Running);
}

#[tokio::test]
async fn test_spawn_missing_template_does_not_start() {
    let host = host();
    let containers = containers(&host);
    let inst = instance().with_image_meta(flex_core::ImageMeta::with_template("alpine"));

    let err = containers.spawn(&inst, &[], &[]).await.unwrap_err();

    assert!(matches!(err, Error::TemplateNotFound { .. }));
    assert!(containers.runtime().calls().await.is_empty());
    assert!(!containers.paths().config(&inst.id).exists());
}

#[tokio::test]
async fn test_list_only_configured_instances() {
    let host = host();
    let containers = containers(&host);
    assert!(containers.list().await.unwrap().is_empty());

    containers.spawn(&instance(), &[], &[]).await.unwrap();
    fs::create_dir_all(host.options.instances_path.join("_base")).unwrap();
    fs::create_dir_all(host.options.instances_path.join("not an id")).unwrap();

    let ids = containers.list().await.unwrap();
    assert_eq!(ids, vec![instance().id]);
}

#[tokio::test]
async fn test_lifecycle_on_unknown_instance() {
    let host = host();
    let containers = containers(&host);
    let inst = instance();

    assert!(matches!(containers.stop(&inst).await, Err(Error::NotFound { .. })));
    assert!(matches!(
        containers.start(&inst, &[]).await,
        Err(Error::NotFound { .. })
    ));
    assert_eq!(containers.state(&inst.id).await.unwrap(), ContainerState::Stopped);
}

#[tokio::test]
async fn test_get_info_on_missing_container() {
    let host = host();
    let driver = LxcDriver::new(
        containers(&host),
        MockHostOps::default(),
        flex_core::DriverOptions::default(),
    );
    let inst = Instance::new(InstanceId::new("gone-1").unwrap(), Flavor::new(512, 1));

    let info = driver.get_info(&inst).await.unwrap();
    assert_eq!(info.state, PowerState::Shutdown);
    assert!(driver.containers().runtime().calls().await.is_empty());
}

#[tokio::test]
async fn test_state_query_failure_is_unknown() {
    let host = host();
    let inst = instance();
    let driver = LxcDriver::new(
        containers(&host),
        MockHostOps::default(),
        flex_core::DriverOptions::default(),
    );
    driver.spawn(&inst, &[], &[]).await.unwrap();
    driver
        .containers()
        .runtime()
        .fail_state(Some("lxc-info: exit status 1".into()))
        .await;

    assert_eq!(
        driver.containers().state(&inst.id).await.unwrap(),
        ContainerState::Unknown
    );
    assert_eq!(driver.get_info(&inst).await.unwrap().state, PowerState::Running);

    let driver = LxcDriver::new(
        containers(&host),
        MockHostOps::default(),
        flex_core::DriverOptions {
            unknown_power_state: flex_core::UnknownStatePolicy::Shutdown,
            ..flex_core::DriverOptions::default()
        },
    );
    driver
        .containers()
        .runtime()
        .fail_state(Some("lxc-info: exit status 1".into()))
        .await;
    assert_eq!(driver.get_info(&inst).await.unwrap().state, PowerState::Shutdown);
}

#[tokio::test]
async fn test_reboot_types() {
    let host = host();
    let containers = containers(&host);
    let inst = instance();
    containers.spawn(&inst, &[], &[]).await.unwrap();

    containers.reboot(&inst, &[], RebootType::Soft).await.unwrap();
    containers.reboot(&inst, &[], RebootType::Hard).await.unwrap();

    let calls = containers.runtime().calls().await;
    assert_eq!(
        calls[1..],
        [
            RuntimeCall::Reboot(inst.id.clone()),
            RuntimeCall::Stop(inst.id.clone(), true),
            RuntimeCall::Start(inst.id.clone()),
        ]
    );
}

#[tokio::test]
async fn test_destroy_removes_directory() {
    let host = host();
    let containers = containers(&host);
    let inst = instance();
    containers.spawn(&inst, &[], &[]).await.unwrap();

    containers.destroy(&inst, &[], true).await.unwrap();

    assert!(!containers.paths().instance_dir(&inst.id).exists());
    assert_eq!(
        containers.runtime().calls().await[1..],
        [
            RuntimeCall::Stop(inst.id.clone(), true),
            RuntimeCall::Destroy(inst.id.clone()),
        ]
    );

    // already gone
    containers.destroy(&inst, &[], true).await.unwrap();
}

#[tokio::test]
async fn test_destroy_keeps_disks() {
    let host = host();
    let containers = containers(&host);
    let inst = instance();
    containers.spawn(&inst, &[], &[]).await.unwrap();
    containers.stop(&inst).await.unwrap();

    containers.destroy(&inst, &[], false).await.unwrap();

    assert!(containers.paths().config(&inst.id).exists());
    assert!(
        !containers
            .runtime()
            .calls()
            .await
            .contains(&RuntimeCall::Destroy(inst.id.clone()))
    );
}

#[tokio::test]
async fn test_console_output() {
    let host = host();
    let containers = containers(&host);
    let inst = instance();
    containers.spawn(&inst, &[], &[]).await.unwrap();

    assert_eq!(containers.console_output(&inst).await.unwrap(), "");

    fs::write(containers.paths().console(&inst.id), "Ubuntu 14.04 abc-123 console\n").unwrap();
    assert_eq!(
        containers.console_output(&inst).await.unwrap(),
        "Ubuntu 14.04 abc-123 console\n"
    );
}

#[tokio::test]
async fn test_volume_without_device_path() {
    let host = host();
    let containers = containers(&host);
    let inst = instance();
    containers.spawn(&inst, &[], &[]).await.unwrap();

    let iscsi = ConnectionInfo {
        driver_volume_type: "iscsi".to_string(),
        data: serde_json::json!({ "target_iqn": "iqn.2010-10.org.openstack:volume-1" }),
    };

    assert!(matches!(
        containers.attach_volume(&iscsi, &inst, "/mnt/data").await,
        Err(Error::Unsupported { .. })
    ));

    containers
        .detach_volume(&ConnectionInfo::local("/dev/sdb"), &inst, "/mnt/data")
        .await
        .unwrap();
    assert!(
        containers
            .runtime()
            .calls()
            .await
            .contains(&RuntimeCall::RemoveDevice(inst.id.clone(), "/dev/sdb".into()))
    );
}

#[tokio::test]
async fn test_driver_over_local_containers() {
    let host = host();
    let driver = LxcDriver::new(
        containers(&host),
        MockHostOps::default(),
        flex_core::DriverOptions::default(),
    );
    let inst = instance();

    driver.spawn(&inst, &[], &[]).await.unwrap();
    assert_eq!(driver.get_info(&inst).await.unwrap().state, PowerState::Running);

    driver.power_off(&inst).await.unwrap();
    assert_eq!(driver.get_info(&inst).await.unwrap().state, PowerState::Shutdown);
}
