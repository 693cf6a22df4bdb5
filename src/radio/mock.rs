//! Recording radio for unit tests.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use super::*;
use crate::le::RawAddr;

/// Primitive invocation recorded by [`MockRadio`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Call {
    InitStack,
    SetDeviceAddress(Addr),
    SetDeviceName(String),
    SetTxPower(TxPower),
    SetAdvParams(AdvParams),
    SetAdvData(Vec<u8>),
    SetScanResponseData(Vec<u8>),
    StartAdvertising,
    StopAdvertising,
    SetScanParams(ScanParams),
    StartScan,
    StopScan,
    Connect(Addr, ConnParams),
    Disconnect(ConnHandle),
    SetPpcp(ConnParams),
    AddService(Uuid),
    AddCharacteristic(Handle, Uuid, CharProps),
    SetCharValue(Handle, Vec<u8>),
    Notify(ConnHandle, Handle, Vec<u8>),
    Indicate(ConnHandle, Handle, Vec<u8>),
    WriteWithResponse(ConnHandle, Handle, Vec<u8>),
    WriteWithoutResponse(ConnHandle, Handle, Vec<u8>),
}

/// Radio that records primitive calls, allocates attribute handles
/// sequentially, and stores attribute values in memory. Individual primitives
/// can be made to fail.
#[derive(Debug)]
pub(crate) struct MockRadio(Mutex<State>);

#[derive(Debug)]
struct State {
    initialized: bool,
    addr: Addr,
    tx_power: TxPower,
    next_hdl: u16,
    calls: Vec<Call>,
    fail: HashMap<&'static str, Status>,
    local: BTreeMap<Handle, Vec<u8>>,
    peer: BTreeMap<(ConnHandle, Handle), Vec<u8>>,
    sink: Option<EventSender>,
}

impl MockRadio {
    pub const ADDR: Addr = Addr::Public(RawAddr::new([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]));

    /// Creates an initialized radio.
    pub fn new() -> Self {
        let r = Self::uninitialized();
        r.0.lock().initialized = true;
        r
    }

    /// Creates a radio that requires [`Radio::init_stack`].
    pub fn uninitialized() -> Self {
        Self(Mutex::new(State {
            initialized: false,
            addr: Self::ADDR,
            tx_power: TxPower::new(0),
            next_hdl: 1,
            calls: Vec::new(),
            fail: HashMap::new(),
            local: BTreeMap::new(),
            peer: BTreeMap::new(),
            sink: None,
        }))
    }

    /// Makes all subsequent calls to primitive `op` fail with `st`.
    pub fn fail(&self, op: &'static str, st: Status) {
        self.0.lock().fail.insert(op, st);
    }

    /// Removes all failures.
    pub fn heal(&self) {
        self.0.lock().fail.clear();
    }

    /// Returns and clears the recorded calls.
    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.0.lock().calls)
    }

    /// Returns a copy of the recorded calls.
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().calls.clone()
    }

    /// Sets a peer attribute value returned by [`Radio::read`].
    pub fn set_peer_value(&self, conn: ConnHandle, hdl: Handle, v: &[u8]) {
        self.0.lock().peer.insert((conn, hdl), v.to_vec());
    }

    /// Delivers an event through the registered sink.
    pub fn emit(&self, evt: Event) {
        let st = self.0.lock();
        let tx = st.sink.as_ref().expect("event sink not registered");
        tx.send(evt).expect("event receiver closed");
    }

    /// Drops the event sink, closing the event channel.
    pub fn close_sink(&self) {
        self.0.lock().sink = None;
    }

    fn exec<T>(
        &self,
        op: &'static str,
        call: Option<Call>,
        f: impl FnOnce(&mut State) -> T,
    ) -> Result<T> {
        let mut st = self.0.lock();
        if let Some(&e) = st.fail.get(op) {
            return Err(e);
        }
        if let Some(c) = call {
            st.calls.push(c);
        }
        Ok(f(&mut *st))
    }

    fn record(&self, op: &'static str, c: Call) -> Result<()> {
        self.exec(op, Some(c), |_| ())
    }
}

impl State {
    fn alloc(&mut self) -> Handle {
        let h = Handle::new(self.next_hdl).expect("handle space exhausted");
        self.next_hdl += 1;
        h
    }
}

impl Radio for MockRadio {
    fn init_stack(&self) -> Result<()> {
        self.exec("init_stack", Some(Call::InitStack), |st| st.initialized = true)
    }

    fn is_initialized(&self) -> bool {
        self.0.lock().initialized
    }

    fn set_event_sink(&self, tx: EventSender) -> Result<()> {
        self.exec("set_event_sink", None, |st| st.sink = Some(tx))
    }

    fn device_address(&self) -> Result<Addr> {
        self.exec("device_address", None, |st| st.addr)
    }

    fn set_device_address(&self, addr: Addr) -> Result<()> {
        self.exec("set_device_address", Some(Call::SetDeviceAddress(addr)), |st| {
            st.addr = addr;
        })
    }

    fn set_device_name(&self, name: &str) -> Result<()> {
        self.record("set_device_name", Call::SetDeviceName(name.to_owned()))
    }

    fn tx_power(&self) -> Result<TxPower> {
        self.exec("tx_power", None, |st| st.tx_power)
    }

    fn set_tx_power(&self, p: TxPower) -> Result<()> {
        self.exec("set_tx_power", Some(Call::SetTxPower(p)), |st| st.tx_power = p)
    }

    fn set_adv_params(&self, p: &AdvParams) -> Result<()> {
        self.record("set_adv_params", Call::SetAdvParams(*p))
    }

    fn set_adv_data(&self, v: &[u8]) -> Result<()> {
        self.record("set_adv_data", Call::SetAdvData(v.to_vec()))
    }

    fn set_scan_response_data(&self, v: &[u8]) -> Result<()> {
        self.record("set_scan_response_data", Call::SetScanResponseData(v.to_vec()))
    }

    fn start_advertising(&self) -> Result<()> {
        self.record("start_advertising", Call::StartAdvertising)
    }

    fn stop_advertising(&self) -> Result<()> {
        self.record("stop_advertising", Call::StopAdvertising)
    }

    fn set_scan_params(&self, p: &ScanParams) -> Result<()> {
        self.record("set_scan_params", Call::SetScanParams(*p))
    }

    fn start_scan(&self) -> Result<()> {
        self.record("start_scan", Call::StartScan)
    }

    fn stop_scan(&self) -> Result<()> {
        self.record("stop_scan", Call::StopScan)
    }

    fn connect(&self, peer: Addr, p: &ConnParams) -> Result<()> {
        self.record("connect", Call::Connect(peer, *p))
    }

    fn disconnect(&self, conn: ConnHandle) -> Result<()> {
        self.record("disconnect", Call::Disconnect(conn))
    }

    fn set_ppcp(&self, p: &ConnParams) -> Result<()> {
        self.record("set_ppcp", Call::SetPpcp(*p))
    }

    fn add_service(&self, uuid: &Uuid) -> Result<Handle> {
        self.exec("add_service", Some(Call::AddService(*uuid)), State::alloc)
    }

    fn add_characteristic(&self, c: &CharDef<'_>) -> Result<CharHandles> {
        let call = Call::AddCharacteristic(c.service, c.uuid, c.props);
        self.exec("add_characteristic", Some(call), |st| {
            let decl = Some(st.alloc());
            let value = Some(st.alloc());
            let user_desc = (!c.description.is_empty()).then(|| st.alloc());
            let cccd = c.props.has_cccd().then(|| st.alloc());
            let sccd = (c.props.contains(CharProps::BROADCAST)).then(|| st.alloc());
            CharHandles {
                decl,
                value,
                user_desc,
                cccd,
                sccd,
            }
        })
    }

    fn char_value(&self, hdl: Handle, buf: &mut [u8]) -> Result<usize> {
        self.exec("char_value", None, |st| {
            let v = st.local.get(&hdl).map_or(&[][..], Vec::as_slice);
            let n = v.len().min(buf.len());
            buf[..n].copy_from_slice(&v[..n]);
            n
        })
    }

    fn set_char_value(&self, hdl: Handle, v: &[u8]) -> Result<()> {
        self.exec("set_char_value", Some(Call::SetCharValue(hdl, v.to_vec())), |st| {
            st.local.insert(hdl, v.to_vec());
        })
    }

    fn notify(&self, conn: ConnHandle, hdl: Handle, v: &[u8]) -> Result<()> {
        self.record("notify", Call::Notify(conn, hdl, v.to_vec()))
    }

    fn indicate(&self, conn: ConnHandle, hdl: Handle, v: &[u8]) -> Result<()> {
        self.record("indicate", Call::Indicate(conn, hdl, v.to_vec()))
    }

    fn read(&self, conn: ConnHandle, hdl: Handle, buf: &mut [u8]) -> Result<usize> {
        self.exec("read", None, |st| {
            let v = st.peer.get(&(conn, hdl)).map_or(&[][..], Vec::as_slice);
            let n = v.len().min(buf.len());
            buf[..n].copy_from_slice(&v[..n]);
            n
        })
    }

    fn write_with_response(&self, conn: ConnHandle, hdl: Handle, v: &[u8]) -> Result<()> {
        let call = Call::WriteWithResponse(conn, hdl, v.to_vec());
        self.exec("write_with_response", Some(call), |st| {
            st.peer.insert((conn, hdl), v.to_vec());
        })
    }

    fn write_without_response(&self, conn: ConnHandle, hdl: Handle, v: &[u8]) -> Result<()> {
        let call = Call::WriteWithoutResponse(conn, hdl, v.to_vec());
        self.exec("write_without_response", Some(call), |st| {
            st.peer.insert((conn, hdl), v.to_vec());
        })
    }
}
