use flex_core::{DriverOptions, Error, Flavor, Instance, InstanceId, UnknownStatePolicy};
use flex_driver::*;
use std::fs;

fn instance(id: &str) -> Instance {
    Instance::new(InstanceId::new(id).unwrap(), Flavor::new(512, 2))
}

fn driver(options: DriverOptions) -> LxcDriver<MockContainers, MockHostOps> {
    LxcDriver::new(MockContainers::new(), MockHostOps::default(), options)
}

#[tokio::test]
async fn test_lifecycle_is_forwarded() {
    let driver = driver(DriverOptions::default());
    let inst = instance("abc-123");

    driver.init_host("node-1").await.unwrap();
    driver.spawn(&inst, &[], &[]).await.unwrap();
    driver.reboot(&inst, &[], RebootType::Hard).await.unwrap();
    driver.power_off(&inst).await.unwrap();
    driver.power_on(&inst, &[]).await.unwrap();
    driver.destroy(&inst, &[], true).await.unwrap();

    assert_eq!(
        driver.containers().calls().await,
        vec!["init", "spawn", "reboot", "stop", "start", "destroy"]
    );
    assert!(driver.list_instances().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_instances() {
    let driver = driver(DriverOptions::default());
    driver.spawn(&instance("b-2"), &[], &[]).await.unwrap();
    driver.spawn(&instance("a-1"), &[], &[]).await.unwrap();

    let names: Vec<String> = driver
        .list_instances()
        .await
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(names, ["a-1", "b-2"]);
}

#[tokio::test]
async fn test_get_info_maps_states() {
    let driver = driver(DriverOptions::default());
    let inst = instance("abc-123");
    driver.spawn(&inst, &[], &[]).await.unwrap();

    let info = driver.get_info(&inst).await.unwrap();
    assert_eq!(info.state, PowerState::Running);
    assert_eq!(info.num_cpu, 2);
    assert_eq!(info.max_mem_kb, 524_288);

    driver.power_off(&inst).await.unwrap();
    assert_eq!(driver.get_info(&inst).await.unwrap().state, PowerState::Shutdown);

    driver
        .containers()
        .set_state(&inst.id, ContainerState::Unknown)
        .await;
    assert_eq!(driver.get_info(&inst).await.unwrap().state, PowerState::Running);
}

#[tokio::test]
async fn test_unknown_state_policy_shutdown() {
    let options = DriverOptions {
        unknown_power_state: UnknownStatePolicy::Shutdown,
        ..DriverOptions::default()
    };
    let driver = driver(options);
    let inst = instance("abc-123");
    driver
        .containers()
        .set_state(&inst.id, ContainerState::Unknown)
        .await;

    assert_eq!(driver.get_info(&inst).await.unwrap().state, PowerState::Shutdown);
}

#[tokio::test]
async fn test_get_info_missing_instance_is_shutdown() {
    let driver = driver(DriverOptions::default());
    let info = driver.get_info(&instance("missing")).await.unwrap();
    assert_eq!(info.state, PowerState::Shutdown);
}

#[tokio::test]
async fn test_failed_spawn_propagates() {
    let driver = driver(DriverOptions::default());
    driver.containers().fail_next("lxc-start failed").await;

    let err = driver.spawn(&instance("abc-123"), &[], &[]).await.unwrap_err();
    assert!(matches!(err, Error::Runtime { .. }));
    assert!(driver.list_instances().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_volumes() {
    let driver = driver(DriverOptions::default());
    let inst = instance("abc-123");
    let connection = ConnectionInfo::local("/dev/sdb");
    driver.spawn(&inst, &[], &[]).await.unwrap();

    driver
        .attach_volume(&connection, &inst, "/mnt/data")
        .await
        .unwrap();
    assert_eq!(driver.containers().volumes(&inst.id).await, ["/mnt/data"]);

    driver
        .detach_volume(&connection, &inst, "/mnt/data")
        .await
        .unwrap();
    assert!(driver.containers().volumes(&inst.id).await.is_empty());
}

#[tokio::test]
async fn test_console_output() {
    let driver = driver(DriverOptions::default());
    let inst = instance("abc-123");
    driver.spawn(&inst, &[], &[]).await.unwrap();
    driver
        .containers()
        .set_console(&inst.id, "login: ")
        .await;

    assert_eq!(driver.get_console_output(&inst).await.unwrap(), "login: ");
}

#[tokio::test]
async fn test_host_queries_are_forwarded() {
    let driver = driver(DriverOptions::default());

    let resources = driver.get_available_resource("node-1").await.unwrap();
    assert_eq!(resources.hypervisor_hostname, "node-1");
    assert_eq!(resources.hypervisor_type, "lxc");

    let stats = driver.get_host_stats(true).await.unwrap();
    assert_eq!(stats.vcpus, 4);

    assert_eq!(
        driver.hostops().calls().await,
        vec![("get_available_resource", false), ("get_host_stats", true)]
    );
}

#[tokio::test]
async fn test_volume_connector() {
    let dir = tempfile::tempdir().unwrap();
    let initiator_file = dir.path().join("initiatorname.iscsi");
    fs::write(&initiator_file, "InitiatorName=iqn.2014-01.com.example:node-1\n").unwrap();

    let options = DriverOptions {
        host: Some("node-1".to_string()),
        my_ip: "10.0.0.5".to_string(),
        initiator_file,
        ..DriverOptions::default()
    };
    let driver = driver(options);

    let connector = driver
        .get_volume_connector(&instance("abc-123"))
        .await
        .unwrap();
    assert_eq!(
        connector,
        VolumeConnector {
            ip: "10.0.0.5".to_string(),
            initiator: Some("iqn.2014-01.com.example:node-1".to_string()),
            host: "node-1".to_string(),
        }
    );
}

#[tokio::test]
async fn test_volume_connector_without_initiator() {
    let dir = tempfile::tempdir().unwrap();
    let options = DriverOptions {
        initiator_file: dir.path().join("missing"),
        ..DriverOptions::default()
    };
    let driver = driver(options);

    let connector = driver
        .get_volume_connector(&instance("abc-123"))
        .await
        .unwrap();
    assert_eq!(connector.initiator, None);
    assert_eq!(connector.ip, "127.0.0.1");
    assert!(!connector.host.is_empty());
}

#[test]
fn test_available_nodes_is_hostname() {
    let driver = driver(DriverOptions::default());
    let nodes = driver.get_available_nodes().unwrap();

    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0], flex_driver::driver::hostname().unwrap());
}
