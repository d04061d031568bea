use std::panic::{catch_unwind, AssertUnwindSafe};

use usbmitm_wire::Message;

use crate::error::EngineError;
use crate::stage::{Flow, Stage, StageInfo};

/// Insertion-ordered collection of registered [`Stage`]s, and the hook
/// dispatch rules (first-non-null / all-run / any-true) documented on
/// [`Stage`] itself.
///
/// A stage whose hook implementation panics is unregistered on the spot
/// rather than allowed to poison the whole engine: a hot-reloaded stage
/// dylib is the likeliest source of a panic that has nothing to do with
/// any other stage's correctness, so the rest of the pipeline keeps
/// running.
#[derive(Default)]
pub struct StageRegistry {
    stages: Vec<(String, Box<dyn Stage>)>,
}

impl StageRegistry {
    pub fn new() -> Self {
        StageRegistry { stages: Vec::new() }
    }

    pub fn register(&mut self, name: impl Into<String>, stage: Box<dyn Stage>) -> Result<(), EngineError> {
        let name = name.into();
        if self.stages.iter().any(|(n, _)| *n == name) {
            return Err(EngineError::DuplicateStage(name));
        }
        self.stages.push((name, stage));
        Ok(())
    }

    /// Removes a stage by name. Returns whether a stage was actually
    /// removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.stages.len();
        self.stages.retain(|(n, _)| n != name);
        self.stages.len() != before
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    fn dispatch_all<R>(
        &mut self,
        hook: &'static str,
        mut f: impl FnMut(&mut dyn Stage) -> R,
    ) -> Vec<R> {
        let mut results = Vec::with_capacity(self.stages.len());
        let mut panicked = Vec::new();
        for (name, stage) in self.stages.iter_mut() {
            let stage_ref: &mut dyn Stage = stage.as_mut();
            match catch_unwind(AssertUnwindSafe(|| f(stage_ref))) {
                Ok(r) => results.push(r),
                Err(_) => {
                    log::error!("stage '{name}' panicked in {hook}; unregistering it");
                    panicked.push(name.clone());
                }
            }
        }
        if !panicked.is_empty() {
            self.stages.retain(|(n, _)| !panicked.contains(n));
        }
        results
    }

    /// First-non-null dispatch: calls stages in registration order and
    /// stops at the first `Some(_)` without calling the rest. Several of
    /// these hooks are side-effecting (a `get_*_packet` pops a datagram
    /// from its producer's queue), so calling every stage regardless of
    /// an earlier answer would silently drop data from every producer
    /// after the first.
    fn dispatch_first<R>(
        &mut self,
        hook: &'static str,
        mut f: impl FnMut(&mut dyn Stage) -> Option<R>,
    ) -> Option<R> {
        let mut panicked = Vec::new();
        let mut result = None;
        for (name, stage) in self.stages.iter_mut() {
            let stage_ref: &mut dyn Stage = stage.as_mut();
            match catch_unwind(AssertUnwindSafe(|| f(stage_ref))) {
                Ok(Some(r)) => {
                    result = Some(r);
                    break;
                }
                Ok(None) => {}
                Err(_) => {
                    log::error!("stage '{name}' panicked in {hook}; unregistering it");
                    panicked.push(name.clone());
                }
            }
        }
        if !panicked.is_empty() {
            self.stages.retain(|(n, _)| !panicked.contains(n));
        }
        result
    }

    pub fn tick(&mut self) {
        self.dispatch_all("usbq_tick", |s| s.tick());
    }

    pub fn wait_for_packet(&mut self) -> Option<bool> {
        self.dispatch_first("usbq_wait_for_packet", |s| s.wait_for_packet())
    }

    pub fn host_has_packet(&mut self) -> bool {
        self.dispatch_all("usbq_host_has_packet", |s| s.host_has_packet())
            .into_iter()
            .any(|x| x)
    }

    pub fn device_has_packet(&mut self) -> bool {
        self.dispatch_all("usbq_device_has_packet", |s| s.device_has_packet())
            .into_iter()
            .any(|x| x)
    }

    pub fn get_host_packet(&mut self) -> Option<Vec<u8>> {
        self.dispatch_first("usbq_get_host_packet", |s| s.get_host_packet())
    }

    pub fn get_device_packet(&mut self) -> Option<Vec<u8>> {
        self.dispatch_first("usbq_get_device_packet", |s| s.get_device_packet())
    }

    pub fn send_host_packet(&mut self, data: &[u8]) -> Option<()> {
        self.dispatch_first("usbq_send_host_packet", |s| s.send_host_packet(data))
    }

    pub fn send_device_packet(&mut self, data: &[u8]) -> Option<()> {
        self.dispatch_first("usbq_send_device_packet", |s| s.send_device_packet(data))
    }

    pub fn host_decode(&mut self, data: &[u8]) -> Option<Message> {
        self.dispatch_first("usbq_host_decode", |s| s.host_decode(data))
    }

    pub fn device_decode(&mut self, data: &[u8]) -> Option<Message> {
        self.dispatch_first("usbq_device_decode", |s| s.device_decode(data))
    }

    pub fn host_encode(&mut self, pkt: &Message) -> Option<Vec<u8>> {
        self.dispatch_first("usbq_host_encode", |s| s.host_encode(pkt))
    }

    pub fn device_encode(&mut self, pkt: &Message) -> Option<Vec<u8>> {
        self.dispatch_first("usbq_device_encode", |s| s.device_encode(pkt))
    }

    pub fn host_modify(&mut self, pkt: &mut Message) {
        self.dispatch_all("usbq_host_modify", |s| s.host_modify(pkt));
    }

    pub fn device_modify(&mut self, pkt: &mut Message) {
        self.dispatch_all("usbq_device_modify", |s| s.device_modify(pkt));
    }

    pub fn log_pkt(&mut self, pkt: &Message, flow: Flow) {
        self.dispatch_all("usbq_log_pkt", |s| s.log_pkt(pkt, flow));
    }

    pub fn teardown(&mut self) {
        self.dispatch_all("usbq_teardown", |s| s.teardown());
    }

    /// Every registered stage's self-description, in registration order.
    pub fn declared_plugins(&self) -> Vec<StageInfo> {
        self.stages
            .iter()
            .map(|(name, stage)| StageInfo {
                name: name.clone(),
                description: stage.description(),
            })
            .collect()
    }
}
