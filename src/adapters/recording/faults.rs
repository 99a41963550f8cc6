//! Recording adapters for the fault service ports.

use std::sync::{Arc, Mutex};

use serde_json::json;

use super::record_result;
use crate::cassette::recorder::CassetteRecorder;
use crate::fault::spec::FaultParams;
use crate::ports::{Endpoint, FaultConnector, FaultFuture, FaultService};

const PORT: &str = "faults";

/// Records connection attempts and wraps every opened channel in a
/// [`RecordingFaultService`] sharing the same cassette.
pub struct RecordingFaultConnector {
    inner: Box<dyn FaultConnector>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingFaultConnector {
    /// Creates a new recording connector wrapping the given implementation.
    pub fn new(inner: Box<dyn FaultConnector>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

impl FaultConnector for RecordingFaultConnector {
    fn connect<'a>(&'a self, endpoint: &'a Endpoint) -> FaultFuture<'a, Box<dyn FaultService>> {
        Box::pin(async move {
            let result = self.inner.connect(endpoint).await;
            record_result(&self.recorder, PORT, "connect", endpoint, result.as_ref().map(|_| &()));
            let service = result?;
            Ok(Box::new(RecordingFaultService::new(service, Arc::clone(&self.recorder)))
                as Box<dyn FaultService>)
        })
    }
}

/// Records every call on one fault service channel.
pub struct RecordingFaultService {
    inner: Box<dyn FaultService>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingFaultService {
    /// Creates a new recording channel wrapping the given implementation.
    pub fn new(inner: Box<dyn FaultService>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

impl FaultService for RecordingFaultService {
    fn get_methods(&mut self) -> FaultFuture<'_, Vec<String>> {
        Box::pin(async move {
            let result = self.inner.get_methods().await;
            record_result(&self.recorder, PORT, "get_methods", &json!({}), result.as_ref());
            result
        })
    }

    fn clear_all_faults(&mut self) -> FaultFuture<'_, ()> {
        Box::pin(async move {
            let result = self.inner.clear_all_faults().await;
            record_result(&self.recorder, PORT, "clear_all_faults", &json!({}), result.as_ref());
            result
        })
    }

    fn clear_fault<'a>(&'a mut self, method: &'a str) -> FaultFuture<'a, ()> {
        Box::pin(async move {
            let result = self.inner.clear_fault(method).await;
            let input = json!({ "method": method });
            record_result(&self.recorder, PORT, "clear_fault", &input, result.as_ref());
            result
        })
    }

    fn set_fault<'a>(
        &'a mut self,
        methods: &'a [String],
        params: &'a FaultParams,
    ) -> FaultFuture<'a, ()> {
        Box::pin(async move {
            let result = self.inner.set_fault(methods, params).await;
            let input = json!({ "methods": methods, "params": params });
            record_result(&self.recorder, PORT, "set_fault", &input, result.as_ref());
            result
        })
    }

    fn set_all_fault<'a>(&'a mut self, params: &'a FaultParams) -> FaultFuture<'a, ()> {
        Box::pin(async move {
            let result = self.inner.set_all_fault(params).await;
            let input = json!({ "params": params });
            record_result(&self.recorder, PORT, "set_all_fault", &input, result.as_ref());
            result
        })
    }

    fn close(&mut self) -> FaultFuture<'_, ()> {
        Box::pin(async move {
            let result = self.inner.close().await;
            record_result(&self.recorder, PORT, "close", &json!({}), result.as_ref());
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::recording::tests::{finish, recorder};
    use crate::fault::client::tests::{FakeService, FakeState};
    use crate::fault::error::FaultError;
    use crate::fault::operation::InterceptableOperation;
    use crate::fault::spec::FaultSpec;
    use crate::fault::FaultInjectionClient;

    struct FakeConnector(Arc<Mutex<FakeState>>);

    impl FaultConnector for FakeConnector {
        fn connect<'a>(&'a self, endpoint: &'a Endpoint) -> FaultFuture<'a, Box<dyn FaultService>> {
            let state = Arc::clone(&self.0);
            Box::pin(async move {
                if endpoint.port == 0 {
                    return Err(FaultError::Transport(std::io::ErrorKind::ConnectionRefused.into()));
                }
                Ok(Box::new(FakeService(state)) as Box<dyn FaultService>)
            })
        }
    }

    #[tokio::test]
    async fn records_a_client_session() {
        let (recorder, path) = recorder("fsfault_rec_faults_test", "faults");
        {
            let state = Arc::new(Mutex::new(FakeState::default()));
            let connector =
                RecordingFaultConnector::new(Box::new(FakeConnector(state)), Arc::clone(&recorder));

            let refused = FaultInjectionClient::connect(&connector, Endpoint::new("localhost", 0)).await;
            assert!(refused.is_err());

            let mut client = FaultInjectionClient::connect(&connector, Endpoint::default()).await.unwrap();
            let spec = FaultSpec::new([InterceptableOperation::Fsync], FaultParams::errno(5));
            client.set_fault(&spec).await.unwrap();
            client.close().await.unwrap();
        }

        let cassette = finish(recorder, &path);
        let methods: Vec<&str> = cassette.interactions.iter().map(|i| i.method.as_str()).collect();
        assert_eq!(methods, vec!["connect", "connect", "clear_all_faults", "set_fault", "close"]);
        assert_eq!(cassette.interactions[0].output["err"]["kind"], "transport");
        assert_eq!(cassette.interactions[3].input["methods"][0], "fsync");
        assert_eq!(cassette.interactions[3].input["params"]["probability"], 100_000);
    }
}
