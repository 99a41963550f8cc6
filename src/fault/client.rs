use std::collections::BTreeSet;

use tracing::{debug, info, instrument, warn};

use super::error::FaultError;
use super::operation::InterceptableOperation;
use super::spec::{FaultParams, FaultSpec};
use crate::ports::{Endpoint, FaultConnector, FaultService};

/// Client for the fault service's control protocol.
///
/// Owns one connection, opened on construction and released by [`close`].
/// Every method is a single round trip; no fault state is kept locally.
///
/// [`close`]: FaultInjectionClient::close
pub struct FaultInjectionClient {
    endpoint: Endpoint,
    service: Option<Box<dyn FaultService>>,
}

/// How the service's advertised operations line up with [`InterceptableOperation`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compatibility {
    /// Operations both sides know.
    pub supported: BTreeSet<InterceptableOperation>,
    /// Names the service advertises that have no local operation.
    pub unknown_remote: Vec<String>,
    /// Local operations the service does not advertise.
    pub missing_remote: Vec<InterceptableOperation>,
}

impl Compatibility {
    /// Whether both vocabularies are identical.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.unknown_remote.is_empty() && self.missing_remote.is_empty()
    }

    fn from_remote_names(names: &[String]) -> Self {
        let mut report = Self::default();
        for name in names {
            match InterceptableOperation::from_wire_name(name) {
                Some(op) => {
                    report.supported.insert(op);
                }
                None => report.unknown_remote.push(name.clone()),
            }
        }
        report.missing_remote = InterceptableOperation::ALL
            .iter()
            .copied()
            .filter(|op| !report.supported.contains(op))
            .collect();
        report
    }
}

impl FaultInjectionClient {
    /// Connects to `endpoint` and clears any fault rules left by a previous session.
    ///
    /// # Errors
    ///
    /// Returns [`FaultError::Transport`] if the connection fails, or any error
    /// from the initial `clear_all_faults` call.
    #[instrument(skip(connector), fields(endpoint = %endpoint))]
    pub async fn connect(
        connector: &dyn FaultConnector,
        endpoint: Endpoint,
    ) -> Result<Self, FaultError> {
        let service = connector.connect(&endpoint).await?;
        Self::from_service(endpoint, service).await
    }

    /// Wraps an already-open channel, clearing all faults on it first.
    ///
    /// # Errors
    ///
    /// Returns any error from the initial `clear_all_faults` call; the channel
    /// is closed before returning it.
    pub async fn from_service(
        endpoint: Endpoint,
        service: Box<dyn FaultService>,
    ) -> Result<Self, FaultError> {
        let mut client = Self { endpoint, service: Some(service) };
        if let Err(err) = client.clear_all_faults().await {
            if let Err(close_err) = client.close().await {
                warn!(error = %close_err, "failed to close fault service connection");
            }
            return Err(err);
        }
        info!(endpoint = %client.endpoint, "connected to fault service");
        Ok(client)
    }

    /// Connects to `endpoint` without clearing anything, so rules installed by
    /// an earlier connection stay active. One-shot commands that adjust rules
    /// incrementally use this.
    ///
    /// # Errors
    ///
    /// Returns [`FaultError::Transport`] if the connection fails.
    #[instrument(skip(connector), fields(endpoint = %endpoint))]
    pub async fn attach(
        connector: &dyn FaultConnector,
        endpoint: Endpoint,
    ) -> Result<Self, FaultError> {
        let service = connector.connect(&endpoint).await?;
        debug!(%endpoint, "attached to fault service");
        Ok(Self { endpoint, service: Some(service) })
    }

    /// Endpoint this client was opened against.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Whether the connection is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.service.is_some()
    }

    fn service(&mut self) -> Result<&mut (dyn FaultService + 'static), FaultError> {
        self.service.as_deref_mut().ok_or(FaultError::ConnectionClosed)
    }

    /// Operation names the service reports it can intercept, as sent on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`FaultError::ConnectionClosed`] after [`close`](Self::close),
    /// otherwise any transport or protocol failure.
    pub async fn list_interceptable_operations(&mut self) -> Result<Vec<String>, FaultError> {
        let names = self.service()?.get_methods().await?;
        debug!(count = names.len(), "listed interceptable operations");
        Ok(names)
    }

    /// Compares the service's advertised operations with the local vocabulary.
    ///
    /// # Errors
    ///
    /// Same as [`list_interceptable_operations`](Self::list_interceptable_operations).
    pub async fn compatibility(&mut self) -> Result<Compatibility, FaultError> {
        let names = self.list_interceptable_operations().await?;
        Ok(Compatibility::from_remote_names(&names))
    }

    /// Removes every active fault rule. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`FaultError::ConnectionClosed`] after [`close`](Self::close),
    /// otherwise any transport or protocol failure.
    pub async fn clear_all_faults(&mut self) -> Result<(), FaultError> {
        self.service()?.clear_all_faults().await?;
        debug!("cleared all faults");
        Ok(())
    }

    /// Removes the rule attached to `operation`, leaving other operations untouched.
    ///
    /// # Errors
    ///
    /// Returns [`FaultError::ConnectionClosed`] after [`close`](Self::close),
    /// otherwise any transport or protocol failure.
    pub async fn clear_fault(&mut self, operation: InterceptableOperation) -> Result<(), FaultError> {
        self.service()?.clear_fault(operation.wire_name()).await?;
        debug!(%operation, "cleared fault");
        Ok(())
    }

    /// Installs `spec` for its target operations, replacing their previous rules.
    ///
    /// # Errors
    ///
    /// Returns [`FaultError::InvalidSpec`] without touching the connection when
    /// the rule is invalid, [`FaultError::ConnectionClosed`] after
    /// [`close`](Self::close), otherwise any transport or protocol failure.
    pub async fn set_fault(&mut self, spec: &FaultSpec) -> Result<(), FaultError> {
        spec.validate()?;
        let methods = spec.wire_names();
        self.service()?.set_fault(&methods, &spec.params).await?;
        debug!(?methods, probability = %spec.params.probability, "set fault");
        Ok(())
    }

    /// Installs one rule for every interceptable operation.
    ///
    /// # Errors
    ///
    /// Returns [`FaultError::InvalidSpec`] without touching the connection when
    /// the parameters are invalid, [`FaultError::ConnectionClosed`] after
    /// [`close`](Self::close), otherwise any transport or protocol failure.
    pub async fn set_all_faults(&mut self, params: &FaultParams) -> Result<(), FaultError> {
        params.validate()?;
        self.service()?.set_all_fault(params).await?;
        debug!(probability = %params.probability, "set fault on all operations");
        Ok(())
    }

    /// Clears all faults, then closes the connection.
    ///
    /// # Errors
    ///
    /// Returns the clearing error if there was one; the connection is closed either way.
    pub async fn clear_and_close(&mut self) -> Result<(), FaultError> {
        let cleared = if self.is_open() { self.clear_all_faults().await } else { Ok(()) };
        let closed = self.close().await;
        cleared.and(closed)
    }

    /// Releases the connection. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the transport error raised while shutting the connection down.
    pub async fn close(&mut self) -> Result<(), FaultError> {
        match self.service.take() {
            Some(mut service) => {
                debug!(endpoint = %self.endpoint, "closing fault service connection");
                service.close().await
            }
            None => Ok(()),
        }
    }
}

impl Drop for FaultInjectionClient {
    fn drop(&mut self) {
        if self.service.is_some() {
            debug!(endpoint = %self.endpoint, "fault client dropped without close");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::fault::spec::{Probability, SpecError};
    use crate::ports::FaultFuture;
    use InterceptableOperation::{Flush, Fsync, Fsyncdir, Open};

    /// In-memory stand-in for the service, tracking active rules per operation.
    #[derive(Default)]
    pub(crate) struct FakeState {
        pub calls: Vec<String>,
        pub rules: BTreeMap<String, FaultParams>,
        pub closed: usize,
    }

    pub(crate) struct FakeService(pub Arc<Mutex<FakeState>>);

    impl FaultService for FakeService {
        fn get_methods(&mut self) -> FaultFuture<'_, Vec<String>> {
            self.0.lock().unwrap().calls.push("get_methods".into());
            let mut names: Vec<String> =
                InterceptableOperation::ALL.iter().map(|op| op.wire_name().to_string()).collect();
            names.retain(|n| n != "bmap");
            names.push("splice".into());
            Box::pin(async move { Ok(names) })
        }

        fn clear_all_faults(&mut self) -> FaultFuture<'_, ()> {
            let mut state = self.0.lock().unwrap();
            state.calls.push("clear_all_faults".into());
            state.rules.clear();
            Box::pin(async { Ok(()) })
        }

        fn clear_fault<'a>(&'a mut self, method: &'a str) -> FaultFuture<'a, ()> {
            let mut state = self.0.lock().unwrap();
            state.calls.push(format!("clear_fault {method}"));
            state.rules.remove(method);
            Box::pin(async { Ok(()) })
        }

        fn set_fault<'a>(
            &'a mut self,
            methods: &'a [String],
            params: &'a FaultParams,
        ) -> FaultFuture<'a, ()> {
            let mut state = self.0.lock().unwrap();
            state.calls.push(format!("set_fault {}", methods.join(",")));
            for method in methods {
                state.rules.insert(method.clone(), params.clone());
            }
            Box::pin(async { Ok(()) })
        }

        fn set_all_fault<'a>(&'a mut self, params: &'a FaultParams) -> FaultFuture<'a, ()> {
            let mut state = self.0.lock().unwrap();
            state.calls.push("set_all_fault".into());
            for op in InterceptableOperation::ALL {
                state.rules.insert(op.wire_name().to_string(), params.clone());
            }
            Box::pin(async { Ok(()) })
        }

        fn close(&mut self) -> FaultFuture<'_, ()> {
            self.0.lock().unwrap().closed += 1;
            Box::pin(async { Ok(()) })
        }
    }

    async fn client() -> (FaultInjectionClient, Arc<Mutex<FakeState>>) {
        let state = Arc::new(Mutex::new(FakeState::default()));
        let client = FaultInjectionClient::from_service(
            Endpoint::default(),
            Box::new(FakeService(Arc::clone(&state))),
        )
        .await
        .unwrap();
        (client, state)
    }

    #[tokio::test]
    async fn construction_clears_all_faults() {
        let (client, state) = client().await;
        assert!(client.is_open());
        assert_eq!(state.lock().unwrap().calls, vec!["clear_all_faults"]);
    }

    #[tokio::test]
    async fn clearing_one_operation_leaves_the_rest_armed() {
        let (mut client, state) = client().await;
        let spec = FaultSpec::new(
            [Flush, Fsync, Fsyncdir],
            FaultParams::errno(0).killing_caller().with_delay_micros(500_000),
        );
        client.set_fault(&spec).await.unwrap();
        client.clear_fault(Fsync).await.unwrap();

        let state = state.lock().unwrap();
        let armed: Vec<_> = state.rules.keys().cloned().collect();
        assert_eq!(armed, vec!["flush", "fsyncdir"]);
        assert!(state.rules["flush"].kill_caller);
        assert_eq!(state.rules["fsyncdir"].delay_micros, 500_000);
    }

    #[tokio::test]
    async fn invalid_rules_never_reach_the_service() {
        let (mut client, state) = client().await;

        let empty = FaultSpec::new([], FaultParams::errno(5));
        assert!(matches!(
            client.set_fault(&empty).await,
            Err(FaultError::InvalidSpec(SpecError::NoTargetOperations))
        ));

        let huge_delay = FaultParams::errno(5).with_delay_micros(u32::MAX);
        assert!(matches!(client.set_all_faults(&huge_delay).await, Err(FaultError::InvalidSpec(_))));

        assert_eq!(state.lock().unwrap().calls, vec!["clear_all_faults"]);
    }

    #[tokio::test]
    async fn later_rules_override_earlier_ones() {
        let (mut client, state) = client().await;
        client.set_all_faults(&FaultParams::errno(5)).await.unwrap();
        let rarely = FaultParams::errno(28).with_probability(Probability::new(10).unwrap());
        client.set_fault(&FaultSpec::new([Open], rarely.clone())).await.unwrap();

        let state = state.lock().unwrap();
        assert_eq!(state.rules["open"], rarely);
        assert_eq!(state.rules["read"].error_number, 5);
    }

    #[tokio::test]
    async fn compatibility_reports_both_directions() {
        let (mut client, _) = client().await;
        let report = client.compatibility().await.unwrap();
        assert!(!report.is_exact());
        assert_eq!(report.unknown_remote, vec!["splice"]);
        assert_eq!(report.missing_remote, vec![InterceptableOperation::Bmap]);
        assert_eq!(report.supported.len(), InterceptableOperation::ALL.len() - 1);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_later_calls_fail() {
        let (mut client, state) = client().await;
        client.close().await.unwrap();
        client.close().await.unwrap();
        assert!(!client.is_open());
        assert_eq!(state.lock().unwrap().closed, 1);

        assert!(matches!(client.clear_all_faults().await, Err(FaultError::ConnectionClosed)));
        assert!(matches!(
            client.list_interceptable_operations().await,
            Err(FaultError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn clear_and_close_leaves_no_rules() {
        let (mut client, state) = client().await;
        client.set_all_faults(&FaultParams::errno(5)).await.unwrap();
        client.clear_and_close().await.unwrap();
        client.clear_and_close().await.unwrap();
        let state = state.lock().unwrap();
        assert!(state.rules.is_empty());
        assert_eq!(state.closed, 1);
    }
}
