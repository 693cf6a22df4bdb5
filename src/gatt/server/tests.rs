use std::sync::Arc;

use matches::assert_matches;
use parking_lot::Mutex;

use crate::gap::ConnParams;
use crate::le::RawAddr;
use crate::radio::mock::{Call, MockRadio};
use crate::radio::Status;
use crate::Role;

use super::*;

fn server(radio: &Arc<MockRadio>) -> GattServer {
    GattServer::local(MockRadio::ADDR, Arc::clone(radio) as Arc<dyn Radio>)
}

fn central(radio: &Arc<MockRadio>, v: u16) -> PeerDevice {
    let conn = ConnHandle::new(v).unwrap();
    let addr = Addr::Random(RawAddr::new([0xC0, 0, 0, 0, 0, 0]));
    let radio = Arc::clone(radio) as Arc<dyn Radio>;
    PeerDevice::new(conn, Role::Central, addr, ConnParams::default(), radio)
}

#[test]
fn add_service() {
    let radio = Arc::new(MockRadio::new());
    let srv = server(&radio);
    assert!(srv.is_local());
    assert_eq!(srv.addr(), MockRadio::ADDR);

    let hrs = Service::new(Uuid::from_u16(0x180D));
    srv.add_service(&hrs).unwrap();
    assert_eq!(hrs.server(), Some(srv.clone()));
    assert_eq!(hrs.handles().map(HandleRange::start), Handle::new(1));
    assert_eq!(srv.service(&Uuid::from_u16(0x180D)), Some(hrs.clone()));

    assert_matches!(srv.add_service(&hrs), Err(Error::InvalidArgument(_)));
    let dup = Service::new(Uuid::from_u16(0x180D));
    assert_matches!(srv.add_service(&dup), Err(Error::InvalidArgument(_)));
    let bad = Service::new(Uuid::default());
    assert_matches!(srv.add_service(&bad), Err(Error::InvalidArgument(_)));
    assert_eq!(srv.service_count(), 1);
    assert_eq!(radio.take_calls(), vec![Call::AddService(Uuid::from_u16(0x180D))]);
}

#[test]
fn uninitialized_stack() {
    let radio = Arc::new(MockRadio::uninitialized());
    let srv = server(&radio);
    let svc = Service::new(Uuid::from_u16(0x180F));
    assert_eq!(srv.add_service(&svc), Err(Error::InvalidState));
    let c = Characteristic::new("level", CharProps::READ);
    assert_eq!(srv.add_characteristic(&c), Err(Error::InvalidState));
    assert_eq!(srv.service_count(), 0);
    assert!(radio.calls().is_empty());
}

#[test]
fn radio_failure() {
    let radio = Arc::new(MockRadio::new());
    let srv = server(&radio);
    radio.fail("add_service", Status::FAILED);
    let svc = Service::new(Uuid::from_u16(0x180F));
    assert_eq!(srv.add_service(&svc), Err(Error::Radio(Status::FAILED)));
    assert!(svc.server().is_none());

    radio.heal();
    srv.add_service(&svc).unwrap();
    radio.fail("add_characteristic", Status::BUSY);
    let c = Characteristic::new("level", CharProps::READ);
    assert_eq!(svc.add_characteristic(&c), Err(Error::Radio(Status::BUSY)));
    assert_eq!(svc.characteristic_count(), 0);
    assert_eq!(c.stub_count(), 0);
}

#[test]
fn characteristic_rules() {
    let radio = Arc::new(MockRadio::new());
    let srv = server(&radio);
    let svc = Service::new(Uuid::from_u16(0x180F));
    let c = Characteristic::with_uuids(
        "level",
        CharProps::READ,
        Uuid::from_u16(0x2A19),
        Uuid::default(),
    );
    assert_eq!(svc.add_characteristic(&c), Err(Error::InvalidState));
    srv.add_service(&svc).unwrap();

    let empty = Characteristic::new("empty", CharProps::empty());
    assert_matches!(svc.add_characteristic(&empty), Err(Error::InvalidArgument(_)));
    svc.add_characteristic(&c).unwrap();
    assert_eq!(c.service_uuid(), Uuid::from_u16(0x180F));
    assert_eq!(c.service(), Some(svc.clone()));
    assert_matches!(svc.add_characteristic(&c), Err(Error::InvalidArgument(_)));
    assert_matches!(svc.add_characteristic(&c.clone()), Err(Error::InvalidArgument(_)));
    let dup = Characteristic::with_uuids(
        "other",
        CharProps::READ,
        Uuid::from_u16(0x2A19),
        Uuid::default(),
    );
    assert_matches!(svc.add_characteristic(&dup), Err(Error::InvalidArgument(_)));

    // Service handle range covers the characteristic
    let r = svc.handles().unwrap();
    assert_eq!((u16::from(r.start()), u16::from(r.end())), (1, 4));
    assert!(svc.contains(&c));
    assert!(!svc.contains(&dup));
    assert!(srv.characteristic_by_desc("level").unwrap().same_as(&c));
    assert!(srv.characteristic_by_handle(Handle::new(4).unwrap()).is_some());
    assert!(srv.characteristic_by_handle(Handle::new(5).unwrap()).is_none());
}

#[test]
fn default_service() {
    let radio = Arc::new(MockRadio::new());
    let srv = server(&radio);
    let a = Characteristic::new("a", CharProps::READ);
    let b = Characteristic::new("b", CharProps::WRITE);
    srv.add_characteristic(&a).unwrap();
    srv.add_characteristic(&b).unwrap();
    assert_eq!(srv.service_count(), 1);
    let svc = srv.service(&Uuid::CONTROL_SERVICE).unwrap();
    assert_eq!(svc.characteristic_count(), 2);
    assert!(a.is_local());
    assert!(a.uuid().is_valid());
    assert_ne!(a.uuid(), b.uuid());

    let other = Characteristic::with_uuids(
        "c",
        CharProps::READ,
        Uuid::default(),
        Uuid::from_u16(0x1815),
    );
    srv.add_characteristic(&other).unwrap();
    assert_eq!(srv.service_count(), 2);
    assert!(srv.characteristic_by_uuid(&other.uuid()).unwrap().same_as(&other));
}

#[test]
fn data_routing() {
    let radio = Arc::new(MockRadio::new());
    let srv = server(&radio);
    let rx = Characteristic::new("rx", CharProps::WRITE | CharProps::WRITE_WITHOUT_RESPONSE);
    let other = Characteristic::new("other", CharProps::WRITE);
    srv.add_characteristic(&rx).unwrap();
    srv.add_characteristic(&other).unwrap();

    let got = Arc::new(Mutex::new(Vec::new()));
    let g = Arc::clone(&got);
    rx.on_data_received(move |v: &[u8], p: &PeerDevice| g.lock().push((v.to_vec(), p.conn())));

    let p = central(&radio, 0x10);
    let v = rx.handles().value.unwrap();
    srv.process_data_written(v, b"ping", &p);
    srv.process_data_written(other.handles().value.unwrap(), b"x", &p);
    srv.process_data_written(Handle::new(0x0100).unwrap(), b"y", &p);
    srv.process_data_written(rx.handles().decl.unwrap(), b"z", &p);
    assert_eq!(*got.lock(), vec![(b"ping".to_vec(), p.conn())]);
}

#[test]
fn unsubscribe_on_disconnect() {
    let radio = Arc::new(MockRadio::new());
    let srv = server(&radio);
    let a = Characteristic::new("a", CharProps::NOTIFY);
    let b = Characteristic::new("b", CharProps::INDICATE);
    srv.add_characteristic(&a).unwrap();
    srv.add_characteristic(&b).unwrap();

    let (p1, p2) = (central(&radio, 1), central(&radio, 2));
    for c in [&a, &b] {
        let cccd = c.handles().cccd.unwrap();
        srv.process_data_written(cccd, &[0x03, 0x00], &p1);
        srv.process_data_written(cccd, &[0x01, 0x00], &p2);
        srv.process_data_written(cccd, &[0x01, 0x00], &p2);
    }
    assert_eq!(a.subscribers(), vec![p1.conn(), p2.conn()]);

    srv.process_data_written(a.handles().cccd.unwrap(), &[0x00, 0x00], &p2);
    assert_eq!(a.subscribers(), vec![p1.conn()]);

    srv.process_disconnected(p1.conn());
    assert!(a.subscribers().is_empty());
    assert_eq!(b.subscribers(), vec![p2.conn()]);
}

#[test]
fn notified_data() {
    let radio = Arc::new(MockRadio::new());
    let p = central(&radio, 5);
    let hdls = CharHandles {
        value: Handle::new(0x0E),
        cccd: Handle::new(0x0F),
        ..CharHandles::default()
    };
    let c = Characteristic::remote(
        "temp",
        CharProps::NOTIFY,
        Uuid::from_u16(0x2A6E),
        Uuid::from_u16(0x181A),
        hdls,
    );
    p.add_characteristic(&c).unwrap();
    let got = Arc::new(Mutex::new(Vec::new()));
    let g = Arc::clone(&got);
    c.on_data_received(move |v: &[u8], _: &PeerDevice| g.lock().extend_from_slice(v));

    let gattc = GattClient::new();
    gattc.process_data_notified(Handle::new(0x0E).unwrap(), &[0x10, 0x09], &p);
    // Peer CCCD writes never reach the mirror's subscription list
    gattc.process_data_notified(Handle::new(0x0F).unwrap(), &[0x01, 0x00], &p);
    assert_eq!(*got.lock(), vec![0x10, 0x09]);
    assert!(c.subscribers().is_empty());
    assert!(!p.gatt().is_local());
    assert_eq!(p.gatt().conn(), Some(p.conn()));
}
