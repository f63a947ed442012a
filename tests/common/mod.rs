#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use otrfanout::{
    Backend, DeviceId, Envelope, FanoutError, FanoutResult, LocalDevice, PrekeyBundle, Reply, Transport, UserId,
};

pub const TIMEOUT: Duration = Duration::from_millis(200);

pub enum Fault {
    Status(u16, String),
    Down,
    Stall(Duration),
}

/// Scripted backend: real device lists and prekey pools, plus per-path faults.
pub struct FakeServer {
    devices: Mutex<HashMap<String, Vec<String>>>,
    prekeys: Mutex<HashMap<(String, String), VecDeque<PrekeyBundle>>>,
    last_resort: Mutex<HashMap<(String, String), PrekeyBundle>>,
    faults: Mutex<HashMap<String, Fault>>,
    post_status: Mutex<u16>,
    post_script: Mutex<VecDeque<u16>>,
    pub calls: Mutex<Vec<String>>,
    pub posted: Mutex<Vec<(String, serde_json::Value)>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self {
            devices: Mutex::default(),
            prekeys: Mutex::default(),
            last_resort: Mutex::default(),
            faults: Mutex::default(),
            post_status: Mutex::new(201),
            post_script: Mutex::default(),
            calls: Mutex::default(),
            posted: Mutex::default(),
        }
    }

    /// Registers the device and publishes `prekeys` one-time keys for it.
    pub fn publish(&self, user: &str, device: &mut LocalDevice, prekeys: u16) {
        let id = device.id().0;
        self.devices
            .lock()
            .unwrap()
            .entry(user.to_owned())
            .or_default()
            .push(id.clone());
        self.prekeys
            .lock()
            .unwrap()
            .insert((user.to_owned(), id.clone()), device.generate_prekeys(prekeys).into());
        self.last_resort
            .lock()
            .unwrap()
            .insert((user.to_owned(), id), device.last_resort());
    }

    /// Lists a device id without any keys behind it.
    pub fn list_bare_device(&self, user: &str, device: &str) {
        self.devices
            .lock()
            .unwrap()
            .entry(user.to_owned())
            .or_default()
            .push(device.to_owned());
    }

    pub fn fault(&self, path: &str, fault: Fault) {
        self.faults.lock().unwrap().insert(path.to_owned(), fault);
    }

    pub fn set_post_status(&self, status: u16) {
        *self.post_status.lock().unwrap() = status;
    }

    /// Statuses for the next posts, in order; afterwards `set_post_status` applies.
    pub fn script_post_statuses(&self, statuses: &[u16]) {
        self.post_script.lock().unwrap().extend(statuses);
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| call.as_str() == path).count()
    }

    pub fn last_envelope(&self) -> Option<Envelope> {
        self.envelopes().pop()
    }

    pub fn envelopes(&self) -> Vec<Envelope> {
        self.posted
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| serde_json::from_value(body.clone()).unwrap())
            .collect()
    }

    async fn apply_fault(&self, path: &str) -> Option<FanoutResult<Reply>> {
        let fault = match self.faults.lock().unwrap().get(path) {
            None => return None,
            Some(Fault::Status(status, body)) => return Some(Ok(Reply::new(*status, body.clone()))),
            Some(Fault::Down) => return Some(Err(FanoutError::Unavailable("connection refused".into()))),
            Some(Fault::Stall(delay)) => *delay,
        };
        tokio::time::sleep(fault).await;
        Some(Ok(Reply::new(500, "")))
    }

    fn route(&self, path: &str) -> Reply {
        let parts: Vec<&str> = path.split('/').collect();
        match parts.as_slice() {
            ["", "users", user, "clients"] => match self.devices.lock().unwrap().get(*user) {
                Some(devices) => {
                    let list: Vec<_> = devices.iter().map(|id| serde_json::json!({ "id": id })).collect();
                    Reply::new(200, serde_json::Value::from(list).to_string())
                }
                None => Reply::new(404, r#"{"label":"not-found"}"#),
            },
            ["", "users", user, "prekeys", device] => {
                let key = (user.to_string(), device.to_string());
                let claimed = self
                    .prekeys
                    .lock()
                    .unwrap()
                    .get_mut(&key)
                    .and_then(VecDeque::pop_front)
                    .or_else(|| self.last_resort.lock().unwrap().get(&key).cloned());
                match claimed {
                    Some(prekey) => Reply::new(
                        200,
                        serde_json::json!({ "client": device, "prekey": prekey.to_json() }).to_string(),
                    ),
                    None => Reply::new(404, r#"{"label":"not-found"}"#),
                }
            }
            _ => Reply::new(404, ""),
        }
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn get(&self, path: &str) -> FanoutResult<Reply> {
        self.calls.lock().unwrap().push(path.to_owned());
        if let Some(reply) = self.apply_fault(path).await {
            return reply;
        }
        Ok(self.route(path))
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> FanoutResult<Reply> {
        self.calls.lock().unwrap().push(path.to_owned());
        if let Some(reply) = self.apply_fault(path).await {
            return reply;
        }
        self.posted.lock().unwrap().push((path.to_owned(), body.clone()));
        let scripted = self.post_script.lock().unwrap().pop_front();
        let status = scripted.unwrap_or_else(|| *self.post_status.lock().unwrap());
        Ok(Reply::new(status, "{}"))
    }
}

/// Receiving devices of every member, keyed by (user, device).
#[derive(Default)]
pub struct Devices(pub HashMap<(UserId, DeviceId), LocalDevice>);

impl Devices {
    pub fn add(&mut self, server: &FakeServer, user: &str, device: &str, prekeys: u16) {
        let mut local = LocalDevice::new(device);
        server.publish(user, &mut local, prekeys);
        self.0.insert((user.into(), device.into()), local);
    }

    pub fn open(&mut self, envelope: &Envelope, user: &str, device: &str) -> Vec<u8> {
        let ciphertext = envelope
            .get(&user.into(), &device.into())
            .unwrap_or_else(|| panic!("no entry for {user}/{device}"));
        self.0
            .get_mut(&(user.into(), device.into()))
            .unwrap()
            .decrypt(&ciphertext.0)
            .unwrap()
    }
}

pub fn backend(server: FakeServer) -> Backend<FakeServer> {
    Backend::new(server, TIMEOUT)
}
