//! Unit tests for the GATT attribute server

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::error::TryRecvError;

use crate::bus::{Arg, Interface, LocalBus, Reply, Request};
use crate::config::{ServerConfig, StopNotifyPolicy};
use crate::error::ErrorKind;
use crate::gatt::*;

const SERVICE_UUID: &str = "0000180d-0000-1000-8000-00805f9b34fb";
const CHR_UUID: &str = "00002a37-0000-1000-8000-00805f9b34fb";
const DESC_UUID: &str = "82602902-1a54-426b-9e36-e84c238bc669";

fn setup() -> (Arc<LocalBus>, GattApplication) {
    setup_with(ServerConfig::default())
}

fn setup_with(config: ServerConfig) -> (Arc<LocalBus>, GattApplication) {
    let bus = Arc::new(LocalBus::new());
    let app = GattApplication::new(config, bus.clone());
    (bus, app)
}

fn path(s: &str) -> ObjectPath {
    s.parse().unwrap()
}

#[test]
fn test_object_path_parse() {
    assert_eq!(path("/").as_str(), "/");
    assert_eq!(path("/service1/characteristic2").as_str(), "/service1/characteristic2");

    for invalid in ["", "service1", "/service1/", "//", "/service-1", "/a b"] {
        let err = invalid.parse::<ObjectPath>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments, "{:?}", invalid);
    }

    assert!(path("/service1/characteristic1").starts_with(&path("/service1")));
    assert!(!path("/service10").starts_with(&path("/service1")));
}

#[test]
fn test_flags_vocabulary() {
    let flags = Flags::characteristic(["read", "notify", "broadcast"]);
    assert!(flags.contains(Capabilities::READ));
    assert!(flags.contains(Capabilities::NOTIFY));
    assert!(!flags.contains(Capabilities::WRITE));
    assert_eq!(flags.names(), &["read", "notify", "broadcast"]);

    let flags = Flags::descriptor(["read", "notify"]);
    assert_eq!(flags.capabilities(), Capabilities::READ);
}

#[test]
fn test_register_service_paths() {
    let (bus, app) = setup();

    let first = app.register_service(SERVICE_UUID).unwrap();
    let second = app.register_service("180f").unwrap();
    assert_eq!(first.as_str(), "/service1");
    assert_eq!(second.as_str(), "/service2");
    assert!(bus.is_exported(&first, Interface::Service));

    let svc = app.registry().service(&second).unwrap();
    assert!(svc.primary);
    assert_eq!(svc.uuid, 0x180Fu16);
    assert!(svc.characteristics.is_empty());

    let err = app.register_service("not-a-uuid").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArguments);
    assert_eq!(app.registry().len(), 2);
}

#[test]
fn test_register_characteristic_with_descriptor() {
    let (bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();

    let desc = DescriptorSpec::new(DESC_UUID, ["read", "write"]);
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[0], &["read", "notify"], Some(&desc))
        .unwrap();
    assert_eq!(chr.as_str(), "/service1/characteristic1");

    let characteristic = app.registry().characteristic(&chr).unwrap();
    assert_eq!(characteristic.service, service);
    assert_eq!(characteristic.descriptors.len(), 1);
    assert_eq!(
        characteristic.descriptors[0].as_str(),
        "/service1/characteristic1/descriptor1"
    );

    let descriptor = app.registry().descriptor(&characteristic.descriptors[0]).unwrap();
    assert_eq!(descriptor.characteristic, chr);
    assert!(bus.is_exported(&descriptor.path, Interface::Descriptor));
    assert!(app.read(&descriptor.path).unwrap().is_empty());

    let svc = app.registry().service(&service).unwrap();
    assert_eq!(svc.characteristics, vec![chr]);
}

#[test]
fn test_register_characteristic_unknown_service() {
    let (bus, app) = setup();
    let err = app
        .register_characteristic(&path("/service9"), CHR_UUID, &[], &["read"], None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(bus.exported().is_empty());
}

#[test]
fn test_register_characteristic_rolls_back() {
    let (bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    let before = app.registry().paths();

    bus.refuse(Interface::Descriptor);
    let desc = DescriptorSpec::new(DESC_UUID, ["read"]);
    let err = app
        .register_characteristic(&service, CHR_UUID, &[1, 2], &["read"], Some(&desc))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RegistrationFailed);

    assert_eq!(app.registry().paths(), before);
    assert_eq!(bus.exported(), vec![(service.clone(), Interface::Service)]);
    assert!(app.registry().service(&service).unwrap().characteristics.is_empty());
}

#[test]
fn test_counters_never_reuse() {
    let (_bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    let first = app
        .register_characteristic(&service, CHR_UUID, &[], &["read"], None)
        .unwrap();

    let removed = app.registry().unregister_characteristic(&first);
    assert_eq!(removed, vec![first.clone()]);

    let second = app
        .register_characteristic(&service, CHR_UUID, &[], &["read"], None)
        .unwrap();
    assert_ne!(first, second);
    assert_eq!(second.as_str(), "/service1/characteristic2");
}

#[test]
fn test_unregister_service_cascades() {
    let (bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    let desc = DescriptorSpec::new(DESC_UUID, ["read"]);
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[0], &["notify"], Some(&desc))
        .unwrap();

    let mut sub = app.start_notify(&chr).unwrap();
    assert!(sub.receiver.try_recv().is_ok());

    app.unregister_service(&service);
    assert!(app.registry().is_empty());
    assert!(bus.exported().is_empty());
    assert_eq!(app.read(&chr).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(app.notifications().subscriber_count(&chr), 0);
    assert_eq!(sub.receiver.try_recv(), Err(TryRecvError::Disconnected));

    // second time is a no-op
    app.unregister_service(&service);
    assert!(app.registry().is_empty());
}

#[test]
fn test_registry_drop_withdraws_exports() {
    let bus = Arc::new(LocalBus::new());
    {
        let app = GattApplication::new(ServerConfig::default(), bus.clone());
        let service = app.register_service(SERVICE_UUID).unwrap();
        app.register_characteristic(&service, CHR_UUID, &[], &["read"], None)
            .unwrap();
        assert_eq!(bus.exported().len(), 2);
    }
    assert!(bus.exported().is_empty());
}

#[test]
fn test_write_then_read() {
    let (bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[0], &["read", "write"], None)
        .unwrap();

    app.write(&chr, &[0x10, 0x20]).unwrap();
    assert_eq!(app.read(&chr).unwrap().as_bytes(), &[0x10, 0x20]);

    app.write(&chr, &[]).unwrap();
    assert!(app.read(&chr).unwrap().is_empty());

    let changes = bus.take_property_changes();
    assert_eq!(changes.len(), 2);
    assert!(changes
        .iter()
        .all(|c| c.path == chr && c.interface == Interface::Characteristic && c.property == "Value"));
}

#[test]
fn test_read_service_not_supported() {
    let (_bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    assert_eq!(app.read(&service).unwrap_err().kind(), ErrorKind::NotSupported);
    assert_eq!(
        app.write(&service, &[1]).unwrap_err().kind(),
        ErrorKind::NotSupported
    );
}

#[test]
fn test_write_sink_observes_writes() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = seen.clone();
    let bus = Arc::new(LocalBus::new());
    let app = GattApplication::new(ServerConfig::default(), bus).with_sink(Arc::new(
        move |bytes: &[u8], len: usize| {
            sink_seen.lock().unwrap().push((bytes.to_vec(), len));
        },
    ));

    let service = app.register_service(SERVICE_UUID).unwrap();
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[], &["write"], None)
        .unwrap();
    app.write(&chr, &[7, 8, 9]).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![(vec![7, 8, 9], 3)]);
}

#[test]
fn test_parse_value() {
    assert_eq!(
        AccessController::parse_value(&Arg::Bytes(vec![1, 2])).unwrap().as_ref(),
        &[1, 2]
    );
    assert_eq!(
        AccessController::parse_value(&Arg::Array(vec![Arg::Byte(3), Arg::Byte(4)]))
            .unwrap()
            .as_ref(),
        &[3, 4]
    );

    for bad in [
        Arg::Str("x".into()),
        Arg::Array(vec![Arg::Byte(1), Arg::Bool(true)]),
        Arg::options(),
    ] {
        let err = AccessController::parse_value(&bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
    }
}

#[test]
fn test_parse_options() {
    assert_eq!(AccessController::parse_options(&Arg::options()).unwrap(), None);

    let device = path("/org/bluez/hci0/dev_00_11_22_33_44_55");
    assert_eq!(
        AccessController::parse_options(&Arg::device_options(device.clone())).unwrap(),
        Some(device.clone())
    );

    let mut options = std::collections::BTreeMap::new();
    options.insert("Device".to_owned(), Arg::ObjectPath(device.clone()));
    options.insert("offset".to_owned(), Arg::Byte(0));
    assert_eq!(
        AccessController::parse_options(&Arg::Dict(options)).unwrap(),
        Some(device)
    );

    let mut options = std::collections::BTreeMap::new();
    options.insert("device".to_owned(), Arg::Str("hci0".into()));
    assert_eq!(
        AccessController::parse_options(&Arg::Dict(options))
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidArguments
    );

    assert_eq!(
        AccessController::parse_options(&Arg::Bytes(vec![]))
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidArguments
    );
}

#[test]
fn test_start_notify_requires_flag() {
    let (_bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[0], &["read"], None)
        .unwrap();

    let err = app.start_notify(&chr).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
    assert_eq!(app.notifications().state(&chr), NotifyState::Unsubscribed);
}

#[test]
fn test_start_notify_delivers_current_value() {
    let (bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[0x33], &["notify"], None)
        .unwrap();

    let mut sub = app.start_notify(&chr).unwrap();
    assert_eq!(app.notifications().state(&chr), NotifyState::Subscribed);

    let event = sub.receiver.try_recv().unwrap();
    assert_eq!(event.path, chr);
    assert_eq!(event.uuid, 0x2A37u16);
    assert_eq!(event.value, vec![0x33]);
    assert_eq!(sub.receiver.try_recv(), Err(TryRecvError::Empty));

    // subscribing does not touch the value
    assert_eq!(app.read(&chr).unwrap().as_bytes(), &[0x33]);
    assert!(bus.property_changes().is_empty());
}

#[test]
fn test_writes_are_delivered_in_order() {
    let (_bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[0], &["notify", "write"], None)
        .unwrap();
    let mut first = app.start_notify(&chr).unwrap();
    let mut second = app.start_notify(&chr).unwrap();
    assert_ne!(first.id, second.id);

    for value in [[1u8], [2], [3]] {
        app.write(&chr, &value).unwrap();
    }

    for sub in [&mut first, &mut second] {
        let values: Vec<Vec<u8>> = std::iter::from_fn(|| sub.receiver.try_recv().ok())
            .map(|e| e.value)
            .collect();
        assert_eq!(values, vec![vec![0], vec![1], vec![2], vec![3]]);
    }
}

#[test]
fn test_descriptor_write_does_not_notify() {
    let (_bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    let desc = DescriptorSpec::new(DESC_UUID, ["read", "write"]);
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[0], &["notify"], Some(&desc))
        .unwrap();
    let desc_path = app.registry().characteristic(&chr).unwrap().descriptors[0].clone();

    let mut sub = app.start_notify(&chr).unwrap();
    sub.receiver.try_recv().unwrap();

    app.write(&desc_path, &[1, 0]).unwrap();
    assert_eq!(sub.receiver.try_recv(), Err(TryRecvError::Empty));

    let err = app.start_notify(&desc_path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
}

#[test]
fn test_slow_subscriber_drops_events() {
    let config = ServerConfig {
        notification_queue_depth: 2,
        ..ServerConfig::default()
    };
    let (_bus, app) = setup_with(config);
    let service = app.register_service(SERVICE_UUID).unwrap();
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[0], &["notify"], None)
        .unwrap();
    let mut sub = app.start_notify(&chr).unwrap();

    for value in 1..=5u8 {
        app.write(&chr, &[value]).unwrap();
    }

    // the initial event and the first write fill the queue
    assert_eq!(sub.receiver.try_recv().unwrap().value, vec![0]);
    assert_eq!(sub.receiver.try_recv().unwrap().value, vec![1]);
    assert_eq!(sub.receiver.try_recv(), Err(TryRecvError::Empty));
    assert_eq!(app.read(&chr).unwrap().as_bytes(), &[5]);
}

#[test]
fn test_dropped_subscription_is_pruned() {
    let (_bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[0], &["notify"], None)
        .unwrap();

    let sub = app.start_notify(&chr).unwrap();
    drop(sub);
    assert_eq!(app.notifications().subscriber_count(&chr), 0);

    app.write(&chr, &[1]).unwrap();
    assert_eq!(app.notifications().state(&chr), NotifyState::Unsubscribed);
}

#[test]
fn test_stop_notify_unsubscribes() {
    let (_bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[0], &["notify"], None)
        .unwrap();

    let mut sub = app.start_notify(&chr).unwrap();
    sub.receiver.try_recv().unwrap();

    app.stop_notify(&chr, sub.id).unwrap();
    assert_eq!(app.notifications().state(&chr), NotifyState::Unsubscribed);
    app.write(&chr, &[1]).unwrap();
    assert_eq!(sub.receiver.try_recv(), Err(TryRecvError::Disconnected));

    // stopping again is a no-op
    app.stop_notify(&chr, sub.id).unwrap();
}

#[test]
fn test_stop_notify_reject_policy() {
    let config = ServerConfig {
        stop_notify: StopNotifyPolicy::Reject,
        ..ServerConfig::default()
    };
    let (_bus, app) = setup_with(config);
    let service = app.register_service(SERVICE_UUID).unwrap();
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[0], &["notify"], None)
        .unwrap();

    let sub = app.start_notify(&chr).unwrap();
    let err = app.stop_notify(&chr, sub.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
    assert_eq!(app.notifications().state(&chr), NotifyState::Subscribed);
}

#[test]
fn test_dispatch_read_write() {
    let (_bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[0], &["read", "write"], None)
        .unwrap();

    let reply = app
        .dispatch(
            &chr,
            Request::WriteValue {
                value: Arg::Bytes(vec![4, 2]),
                options: Arg::options(),
            },
        )
        .unwrap();
    assert!(matches!(reply, Reply::Empty));

    let reply = app
        .dispatch(&chr, Request::ReadValue { options: Arg::options() })
        .unwrap();
    assert_eq!(reply.into_value(), Some(Arg::Bytes(vec![4, 2])));
}

#[test]
fn test_dispatch_rejects_bad_payload_before_writing() {
    let (bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[9], &["read", "write"], None)
        .unwrap();

    let err = app
        .dispatch(
            &chr,
            Request::WriteValue {
                value: Arg::Str("nope".into()),
                options: Arg::options(),
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArguments);

    let err = app
        .dispatch(
            &chr,
            Request::WriteValue {
                value: Arg::Bytes(vec![1]),
                options: Arg::Bool(true),
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArguments);

    assert_eq!(app.read(&chr).unwrap().as_bytes(), &[9]);
    assert!(bus.property_changes().is_empty());
}

#[test]
fn test_dispatch_enforces_capabilities() {
    let (_bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    let read_only = app
        .register_characteristic(&service, CHR_UUID, &[1], &["read"], None)
        .unwrap();

    let err = app
        .dispatch(
            &read_only,
            Request::WriteValue {
                value: Arg::Bytes(vec![2]),
                options: Arg::options(),
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotPermitted);
    assert_eq!(app.read(&read_only).unwrap().as_bytes(), &[1]);

    let err = app
        .dispatch(
            &read_only,
            Request::SetProperty("Value".into(), Arg::Bytes(vec![2])),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotPermitted);

    // the engine itself does not consult flags
    app.write(&read_only, &[3]).unwrap();
    assert_eq!(app.read(&read_only).unwrap().as_bytes(), &[3]);
}

#[test]
fn test_dispatch_without_enforcement() {
    let config = ServerConfig {
        enforce_capabilities: false,
        ..ServerConfig::default()
    };
    let (_bus, app) = setup_with(config);
    let service = app.register_service(SERVICE_UUID).unwrap();
    let write_only = app
        .register_characteristic(&service, CHR_UUID, &[5], &["write"], None)
        .unwrap();

    let reply = app
        .dispatch(&write_only, Request::ReadValue { options: Arg::options() })
        .unwrap();
    assert_eq!(reply.into_value(), Some(Arg::Bytes(vec![5])));
}

#[test]
fn test_dispatch_properties() {
    let (_bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    let desc = DescriptorSpec::new(DESC_UUID, ["read", "write"]);
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[0], &["read", "notify"], Some(&desc))
        .unwrap();
    let desc_path = app.registry().characteristic(&chr).unwrap().descriptors[0].clone();

    let get = |path: &ObjectPath, name: &str| {
        app.dispatch(path, Request::GetProperty(name.into()))
            .map(|reply| reply.into_value().unwrap())
    };

    assert_eq!(get(&service, "UUID").unwrap(), Arg::Str(SERVICE_UUID.into()));
    assert_eq!(get(&service, "Primary").unwrap(), Arg::Bool(true));
    assert_eq!(get(&service, "Includes").unwrap(), Arg::Array(vec![]));
    assert_eq!(get(&chr, "Service").unwrap(), Arg::ObjectPath(service.clone()));
    assert_eq!(get(&chr, "Value").unwrap(), Arg::Bytes(vec![0]));
    assert_eq!(get(&chr, "Flags").unwrap(), Arg::strings(["read", "notify"]));
    assert_eq!(get(&desc_path, "Characteristic").unwrap(), Arg::ObjectPath(chr.clone()));
    assert_eq!(get(&desc_path, "UUID").unwrap(), Arg::Str(DESC_UUID.into()));

    assert_eq!(get(&service, "Value").unwrap_err().kind(), ErrorKind::InvalidArguments);
    assert_eq!(get(&chr, "Bogus").unwrap_err().kind(), ErrorKind::InvalidArguments);

    let err = app
        .dispatch(&chr, Request::SetProperty("UUID".into(), Arg::Str("180f".into())))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);

    let Reply::Properties(all) = app.dispatch(&chr, Request::GetAll).unwrap() else {
        panic!("expected a property map");
    };
    let names: Vec<&str> = all.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["Flags", "Service", "UUID", "Value"]);
}

#[test]
fn test_get_all_omits_unreadable_value() {
    let (_bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[0], &["write"], None)
        .unwrap();

    let all = app.properties(&chr).unwrap();
    assert!(!all.contains_key("Value"));
    assert!(all.contains_key("Flags"));
}

#[test]
fn test_set_value_property() {
    let (bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[0], &["read", "write"], None)
        .unwrap();

    app.dispatch(&chr, Request::SetProperty("Value".into(), Arg::Bytes(vec![0xAB])))
        .unwrap();
    assert_eq!(app.read(&chr).unwrap().as_bytes(), &[0xAB]);
    assert_eq!(bus.property_changes().len(), 1);

    let err = app
        .dispatch(&chr, Request::SetProperty("Value".into(), Arg::Bool(false)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArguments);
    assert_eq!(app.read(&chr).unwrap().as_bytes(), &[0xAB]);
}

#[test]
fn test_dispatch_unknown_path() {
    let (_bus, app) = setup();
    let err = app
        .dispatch(&path("/service7"), Request::GetAll)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_dispatch_notify_requests() {
    let (_bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[0], &["notify"], None)
        .unwrap();

    let Reply::Subscribed(mut sub) = app.dispatch(&chr, Request::StartNotify).unwrap() else {
        panic!("expected a subscription");
    };
    assert_eq!(sub.path, chr);
    assert_eq!(sub.receiver.try_recv().unwrap().value, vec![0]);

    let reply = app
        .dispatch(&chr, Request::StopNotify { subscription: sub.id })
        .unwrap();
    assert!(matches!(reply, Reply::Empty));

    let err = app.dispatch(&service, Request::StartNotify).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
}

#[test]
fn test_managed_objects() {
    let (_bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[0], &["read"], None)
        .unwrap();

    let objects = app.managed_objects().unwrap();
    assert_eq!(objects.len(), 2);
    assert_eq!(objects[&service].interface, Interface::Service);
    assert_eq!(objects[&chr].interface, Interface::Characteristic);
    assert_eq!(objects[&chr].properties["Value"], Arg::Bytes(vec![0]));
}

#[test]
fn test_start_notify_prunes_dropped_subscribers() {
    let (_bus, app) = setup();
    let service = app.register_service(SERVICE_UUID).unwrap();
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[0], &["notify"], None)
        .unwrap();

    for _ in 0..100 {
        drop(app.start_notify(&chr).unwrap());
    }
    assert_eq!(app.notifications().slots(&chr), 1);

    let _live = app.start_notify(&chr).unwrap();
    assert_eq!(app.notifications().slots(&chr), 1);
    assert_eq!(app.notifications().subscriber_count(&chr), 1);
}

#[test]
fn test_concurrent_writes_are_never_torn() {
    const WRITERS: u8 = 4;
    const ROUNDS: usize = 200;
    const LEN: usize = 64;

    let config = ServerConfig {
        notification_queue_depth: 2 * WRITERS as usize * ROUNDS,
        ..ServerConfig::default()
    };
    let (_bus, app) = setup_with(config);
    let service = app.register_service(SERVICE_UUID).unwrap();
    let chr = app
        .register_characteristic(&service, CHR_UUID, &[0; LEN], &["read", "write", "notify"], None)
        .unwrap();
    let mut first = app.start_notify(&chr).unwrap();
    let mut second = app.start_notify(&chr).unwrap();

    std::thread::scope(|s| {
        for writer in 1..=WRITERS {
            let app = &app;
            let chr = &chr;
            s.spawn(move || {
                for _ in 0..ROUNDS {
                    app.write(chr, &[writer; LEN]).unwrap();
                }
            });
        }
        for _ in 0..2 {
            let app = &app;
            let chr = &chr;
            s.spawn(move || {
                for _ in 0..ROUNDS {
                    let value = app.read(chr).unwrap();
                    let bytes = value.as_bytes();
                    assert_eq!(bytes.len(), LEN);
                    assert!(bytes.iter().all(|b| *b == bytes[0]), "torn read {:?}", value);
                }
            });
        }
    });

    let last = app.read(&chr).unwrap().into_bytes();
    let first_events: Vec<Vec<u8>> = std::iter::from_fn(|| first.receiver.try_recv().ok())
        .map(|e| e.value)
        .collect();
    let second_events: Vec<Vec<u8>> = std::iter::from_fn(|| second.receiver.try_recv().ok())
        .map(|e| e.value)
        .collect();

    assert_eq!(first_events.len(), 1 + WRITERS as usize * ROUNDS);
    assert_eq!(first_events.last(), Some(&last));
    assert!(first_events
        .iter()
        .all(|v| v.len() == LEN && v.iter().all(|b| *b == v[0])));
    // every subscriber observes the same commit order
    assert_eq!(&first_events[1..], &second_events[1..]);
}

#[test]
fn test_start_notify_racing_unregister_leaves_no_subscriber() {
    use std::sync::atomic::{AtomicBool, Ordering};

    let (_bus, app) = setup();
    let current: Mutex<Option<ObjectPath>> = Mutex::new(None);
    let done = AtomicBool::new(false);

    let subscriptions = std::thread::scope(|s| {
        let subscriber = s.spawn(|| {
            let mut subscriptions = Vec::new();
            while !done.load(Ordering::Acquire) {
                let target = current.lock().unwrap().clone();
                if let Some(path) = target {
                    if let Ok(sub) = app.start_notify(&path) {
                        subscriptions.push(sub);
                    }
                }
            }
            subscriptions
        });

        for _ in 0..2000 {
            let service = app.register_service(SERVICE_UUID).unwrap();
            let chr = app
                .register_characteristic(&service, CHR_UUID, &[0], &["notify"], None)
                .unwrap();
            *current.lock().unwrap() = Some(chr);
            std::thread::yield_now();
            app.unregister_service(&service);
        }
        done.store(true, Ordering::Release);
        subscriber.join().unwrap()
    });

    assert!(app.registry().is_empty());
    for mut sub in subscriptions {
        assert_eq!(app.notifications().slots(&sub.path), 0, "{}", sub.path);
        while sub.receiver.try_recv().is_ok() {}
        assert_eq!(sub.receiver.try_recv(), Err(TryRecvError::Disconnected));
    }
}

#[test]
fn test_paths_sort_lexicographically() {
    let (_bus, app) = setup();
    for _ in 0..10 {
        app.register_service(SERVICE_UUID).unwrap();
    }

    let paths: Vec<String> = app
        .registry()
        .paths()
        .iter()
        .map(|p| p.as_str().to_owned())
        .collect();
    assert_eq!(paths[0], "/service1");
    assert_eq!(paths[1], "/service10");
    assert_eq!(paths[2], "/service2");

    let listed: Vec<ObjectPath> = app.managed_objects().unwrap().into_keys().collect();
    assert_eq!(listed, app.registry().paths());
}
