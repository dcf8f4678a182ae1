//! Foreign bridge
//!
//! The bridge handle (`Value::Bridge`) is a receiver whose every method call
//! is forwarded, by name, to whatever `ForeignBridge` the embedder
//! registered. Without one the call is a soft failure.

use crate::error::RtResult;
use crate::runtime::Runtime;
use crate::value::Value;
use std::rc::Rc;

pub trait ForeignBridge {
    fn call(&self, rt: &Runtime, name: &str, args: &[Value]) -> RtResult<Value>;
}

impl<F> ForeignBridge for F
where
    F: Fn(&Runtime, &str, &[Value]) -> RtResult<Value>,
{
    fn call(&self, rt: &Runtime, name: &str, args: &[Value]) -> RtResult<Value> {
        self(rt, name, args)
    }
}

impl Runtime {
    pub fn set_bridge(&self, bridge: Rc<dyn ForeignBridge>) {
        *self.bridge.borrow_mut() = Some(bridge);
    }

    pub fn bridge_handle(&self) -> Value {
        Value::Bridge
    }

    pub(crate) fn call_bridge(&self, name: &str, args: &[Value]) -> RtResult<Value> {
        // cloned out so the bridge may re-enter the runtime
        let bridge = self.bridge.borrow().clone();
        match bridge {
            Some(bridge) => {
                tracing::trace!(target: "drake_runtime", name, "bridge call");
                bridge.call(self, name, args)
            }
            None => {
                self.diagnostic(&format!("no foreign bridge registered for '{}'", name));
                Ok(Value::Nil)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    #[test]
    fn test_unregistered_bridge_is_soft() {
        let rt = Runtime::with_config(RuntimeConfig::default().with_quiet(true));
        let handle = rt.bridge_handle();
        assert!(rt.invoke(&handle, "read_file", &[], None).unwrap().is_nil());
        assert_eq!(rt.stats().soft_failures.get(), 1);
    }

    #[test]
    fn test_calls_route_by_name() {
        let rt = Runtime::new();
        rt.set_bridge(Rc::new(|rt: &Runtime, name: &str, args: &[Value]| {
            let mut parts = vec![Value::str(name)];
            parts.extend_from_slice(args);
            rt.interpolate(&parts)
        }));
        let got = rt
            .invoke(&Value::Bridge, "echo", &[Value::Int64(1)], None)
            .unwrap();
        assert_eq!(got, Value::str("echo1"));
    }
}
