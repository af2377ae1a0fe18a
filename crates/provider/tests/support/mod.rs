//! In-memory stand-in for the FortiSASE resource API

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use fortisase_client::{
    Endpoint, EndpointKind, Error, InputModel, JsonObject, LockRegistry, Result, RestApi,
};
use serde_json::{json, Value as Json};
use terraform_provider_fortisase::state::{
    decode_msgpack, encode_dynamic_value, DynamicValue,
};
use terraform_provider_fortisase::tfplugin6 as tf;

/// One request the provider made
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub verb: &'static str,
    pub endpoint: &'static str,
    pub mkey: Option<String>,
    pub url_params: BTreeMap<String, String>,
    pub body: JsonObject,
}

#[derive(Default)]
pub struct FakeApi {
    objects: Mutex<HashMap<(&'static str, String), JsonObject>>,
    calls: Mutex<Vec<Call>>,
    /// Reads left before an asynchronous change settles
    pending: Mutex<HashMap<(&'static str, String), u32>>,
    locks: LockRegistry,
    /// Reads an asynchronous change stays in progress
    pub settle_after: u32,
    /// Time every mutation takes
    pub latency: Duration,
}

fn key(endpoint: &Endpoint, input: &InputModel) -> (&'static str, String) {
    let mkey = match endpoint.kind {
        EndpointKind::Singleton => String::new(),
        _ => input
            .mkey
            .clone()
            .or_else(|| {
                input
                    .body_params
                    .get("primaryKey")
                    .and_then(Json::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_default(),
    };
    (endpoint.name, mkey)
}

fn not_found(endpoint: &Endpoint, input: &InputModel) -> Error {
    Error::NotFound {
        kind: endpoint.name.to_string(),
        mkey: input.mkey.clone().unwrap_or_default(),
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settling_after(mut self, reads: u32) -> Self {
        self.settle_after = reads;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Put an object in place as if it had always existed
    pub fn seed(&self, endpoint: &Endpoint, mkey: &str, object: Json) {
        let mkey = match endpoint.kind {
            EndpointKind::Singleton => String::new(),
            _ => mkey.to_string(),
        };
        let object = object.as_object().cloned().unwrap_or_default();
        self.objects
            .lock()
            .unwrap()
            .insert((endpoint.name, mkey), object);
    }

    pub fn object(&self, endpoint: &Endpoint, mkey: &str) -> Option<JsonObject> {
        let mkey = match endpoint.kind {
            EndpointKind::Singleton => String::new(),
            _ => mkey.to_string(),
        };
        self.objects
            .lock()
            .unwrap()
            .get(&(endpoint.name, mkey))
            .cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, verb: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.verb == verb)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, verb: &'static str, endpoint: &Endpoint, input: &InputModel) {
        self.calls.lock().unwrap().push(Call {
            verb,
            endpoint: endpoint.name,
            mkey: input.mkey.clone(),
            url_params: input.url_params.clone(),
            body: input.body_params.clone(),
        });
    }

    /// Singletons roll changes out asynchronously, tracked in `$meta.state`
    fn start_change(&self, endpoint: &Endpoint, k: &(&'static str, String), object: &mut JsonObject, state: &str) {
        if endpoint.kind == EndpointKind::Singleton {
            object.insert("$meta".to_string(), json!({"state": state}));
            self.pending.lock().unwrap().insert(k.clone(), self.settle_after);
        }
    }

    fn settle(&self, k: &(&'static str, String)) {
        let done = {
            let mut pending = self.pending.lock().unwrap();
            match pending.get(k).copied() {
                Some(0) => {
                    pending.remove(k);
                    true
                }
                Some(n) => {
                    pending.insert(k.clone(), n - 1);
                    false
                }
                None => false,
            }
        };
        if !done {
            return;
        }
        let mut objects = self.objects.lock().unwrap();
        let deleting = objects
            .get(k)
            .and_then(|o| o.get("$meta"))
            .and_then(|m| m.get("state"))
            .and_then(Json::as_str)
            == Some("deleting");
        if deleting {
            objects.remove(k);
        } else if let Some(object) = objects.get_mut(k) {
            object.insert("$meta".to_string(), json!({"state": "done"}));
        }
    }
}

#[async_trait]
impl RestApi for FakeApi {
    async fn create(&self, endpoint: &Endpoint, input: &InputModel) -> Result<JsonObject> {
        if endpoint.kind == EndpointKind::Singleton {
            return self.update(endpoint, input).await;
        }
        self.record("create", endpoint, input);
        tokio::time::sleep(self.latency).await;

        let k = key(endpoint, input);
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&k) {
            return Err(Error::Api {
                status: 400,
                message: "Bad Request".to_string(),
                detail: Some(format!("{} already exists", k.1)),
            });
        }
        objects.insert(k, input.body_params.clone());
        Ok(JsonObject::new())
    }

    async fn read(&self, endpoint: &Endpoint, input: &InputModel) -> Result<JsonObject> {
        self.record("read", endpoint, input);
        let k = key(endpoint, input);
        self.settle(&k);
        self.objects
            .lock()
            .unwrap()
            .get(&k)
            .cloned()
            .ok_or_else(|| not_found(endpoint, input))
    }

    async fn update(&self, endpoint: &Endpoint, input: &InputModel) -> Result<JsonObject> {
        self.record("update", endpoint, input);
        tokio::time::sleep(self.latency).await;

        let k = key(endpoint, input);
        let mut objects = self.objects.lock().unwrap();
        if !objects.contains_key(&k) && endpoint.kind != EndpointKind::Singleton {
            return Err(not_found(endpoint, input));
        }
        let object = objects.entry(k.clone()).or_default();
        for (field, value) in &input.body_params {
            object.insert(field.clone(), value.clone());
        }
        self.start_change(endpoint, &k, object, "pending");
        Ok(JsonObject::new())
    }

    async fn delete(&self, endpoint: &Endpoint, input: &InputModel) -> Result<JsonObject> {
        self.record("delete", endpoint, input);
        tokio::time::sleep(self.latency).await;

        let k = key(endpoint, input);
        let mut objects = self.objects.lock().unwrap();
        if endpoint.kind == EndpointKind::Singleton {
            let object = objects.get_mut(&k).ok_or_else(|| not_found(endpoint, input))?;
            self.start_change(endpoint, &k, object, "deleting");
            return Ok(JsonObject::new());
        }
        objects
            .remove(&k)
            .map(|_| JsonObject::new())
            .ok_or_else(|| not_found(endpoint, input))
    }

    async fn action(&self, endpoint: &Endpoint, input: &InputModel) -> Result<JsonObject> {
        self.record("action", endpoint, input);
        tokio::time::sleep(self.latency).await;
        Ok(JsonObject::new())
    }

    fn locks(&self) -> &LockRegistry {
        &self.locks
    }
}

/// Encode a value the way Terraform sends it
pub fn dv(value: &DynamicValue) -> Option<tf::DynamicValue> {
    Some(encode_dynamic_value(value).unwrap())
}

/// Decode a value the provider returned; absent means null
pub fn undv(value: Option<tf::DynamicValue>) -> DynamicValue {
    value
        .map(|v| decode_msgpack(&v.msgpack).unwrap())
        .unwrap_or_default()
}

pub fn errors(diagnostics: &[tf::Diagnostic]) -> Vec<String> {
    diagnostics
        .iter()
        .filter(|d| d.severity == tf::diagnostic::Severity::Error as i32)
        .map(|d| format!("{}: {}", d.summary, d.detail))
        .collect()
}
