//! `fsfault operations` command.

use crate::config::Settings;
use crate::context::ServiceContext;
use crate::fault::InterceptableOperation;

use super::{attach, close_after};

/// Execute the `operations` command.
///
/// Lists the operations this build knows. With `remote`, asks the service
/// instead and reports how its list differs.
///
/// # Errors
///
/// Returns an error string if the service cannot be reached.
pub async fn run(ctx: &ServiceContext, settings: &Settings, remote: bool) -> Result<(), String> {
    if !remote {
        for op in InterceptableOperation::ALL {
            println!("{op}");
        }
        return Ok(());
    }

    let mut client = attach(ctx, settings).await?;
    let report = client.compatibility().await.map_err(|e| e.to_string());
    let report = close_after(client, report).await?;

    for op in &report.supported {
        println!("{op}");
    }
    for name in &report.unknown_remote {
        println!("{name} (unknown locally)");
    }
    for op in &report.missing_remote {
        println!("{op} (not offered by the service)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::run;
    use crate::commands::tests::context;
    use crate::config::Settings;

    #[tokio::test]
    async fn local_listing_needs_no_service() {
        let ctx = context(vec![], vec![], vec![]);
        assert!(run(&ctx, &Settings::default(), false).await.is_ok());
    }

    #[tokio::test]
    async fn remote_listing_closes_the_connection() {
        let ctx = context(
            vec![],
            vec![
                ("faults", "connect", json!({"ok": null})),
                ("faults", "get_methods", json!({"ok": ["open", "splice"]})),
                ("faults", "close", json!({"ok": null})),
            ],
            vec![],
        );
        assert!(run(&ctx, &Settings::default(), true).await.is_ok());
    }

    #[tokio::test]
    async fn unreachable_service_is_an_error() {
        let ctx = context(
            vec![],
            vec![("faults", "connect", json!({"err": {"kind": "transport", "detail": "Connection refused"}}))],
            vec![],
        );
        let err = run(&ctx, &Settings::default(), true).await.unwrap_err();
        assert!(err.contains("Connection refused"));
    }
}
