use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use onefs_s3_config::{
    ConfigError, DynamicRolePatch, GlobalConfigPatch, MemoryStore, PredefinedRolePatch,
};
use onefs_s3_core::{IdentityName, NameStamp};
use onefs_s3_engine::TickOutcome;
use onefs_s3_plugin::{CredentialPlugin, PluginError, spawn_periodic};
use onefs_s3_telemetry::Metrics;
use onefs_s3_test_support::{BackendOperation, ManualClock, MemoryIdentityBackend};

fn start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

fn plugin() -> Result<(CredentialPlugin, MemoryIdentityBackend, ManualClock)> {
    let clock = ManualClock::new(start());
    let backend = MemoryIdentityBackend::with_clock(Arc::new(clock.clone()));
    let plugin = CredentialPlugin::new(
        Arc::new(MemoryStore::new()),
        Arc::new(backend.clone()),
        Arc::new(clock.clone()),
        Metrics::new()?,
    );
    Ok((plugin, backend, clock))
}

fn global_patch() -> GlobalConfigPatch {
    GlobalConfigPatch {
        endpoint: Some("https://cluster.example:8080".to_string()),
        user: Some("admin".to_string()),
        password: Some("hunter2".to_string()),
        cleanup_period: Some(600),
        ..GlobalConfigPatch::default()
    }
}

fn reader_patch() -> DynamicRolePatch {
    DynamicRolePatch {
        bucket: Some("b1".to_string()),
        groups: Some(vec!["s3-readers".to_string()]),
        access_zone: Some("zone-a".to_string()),
        ..DynamicRolePatch::default()
    }
}

#[tokio::test]
async fn unconfigured_plugin_refuses_issuance_and_does_not_sweep() -> Result<()> {
    let (plugin, backend, clock) = plugin()?;
    plugin.initialize().await?;

    let err = plugin
        .issue_dynamic("reader", 0, None)
        .await
        .expect_err("issuance needs configuration");
    assert!(err.is_not_configured());
    assert_eq!(err.operation(), "issue_dynamic");

    clock.advance(TimeDelta::days(1));
    assert_eq!(plugin.periodic().await?, TickOutcome::Disabled);
    assert!(plugin.read_config().await?.is_none());
    assert!(backend.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn configuration_reads_never_return_the_password() -> Result<()> {
    let (plugin, _, _) = plugin()?;
    let written = plugin.write_config(global_patch()).await?;
    assert!(written.password.is_empty());
    assert_eq!(written.user, "admin");

    let read = plugin.read_config().await?.expect("configuration stored");
    assert!(read.password.is_empty());
    assert_eq!(read.ttl, 300);
    assert_eq!(read.username_prefix, "vault");
    Ok(())
}

#[tokio::test]
async fn role_management_passes_through_with_validation() -> Result<()> {
    let (plugin, _, _) = plugin()?;
    plugin.write_role("reader", reader_patch()).await?;
    plugin.write_role("writer", reader_patch()).await?;
    assert_eq!(plugin.list_roles().await?, vec!["reader", "writer"]);

    let err = plugin
        .write_role("broken", DynamicRolePatch::default())
        .await
        .expect_err("bucket and groups are required");
    let PluginError::Config {
        source: ConfigError::Validation { errors, .. },
        ..
    } = &err
    else {
        panic!("expected validation error, got {err:?}");
    };
    assert_eq!(errors.len(), 2);
    assert!(plugin.read_role("broken").await?.is_none());

    plugin.delete_role("writer").await?;
    assert_eq!(plugin.list_roles().await?, vec!["reader"]);

    plugin
        .write_predefined("svc@corp", PredefinedRolePatch::default())
        .await?;
    let predefined = plugin
        .read_predefined("svc@corp")
        .await?
        .expect("predefined role stored");
    assert_eq!(predefined.access_zone, "System");
    assert_eq!(plugin.list_predefined().await?, vec!["svc@corp"]);
    plugin.delete_predefined("svc@corp").await?;
    assert!(plugin.list_predefined().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn backend_failures_expose_identity_and_zone_to_the_host() -> Result<()> {
    let (plugin, backend, _) = plugin()?;
    plugin.write_config(global_patch()).await?;
    plugin.write_role("reader", reader_patch()).await?;
    backend.fail(BackendOperation::CreateIdentity);

    let err = plugin
        .issue_dynamic("reader", 0, Some("3f2a9c1e"))
        .await
        .expect_err("create failure must surface");
    assert_eq!(err.operation(), "issue_dynamic");
    assert_eq!(err.to_string(), "credential engine operation failed");

    let (operation, identity, scope) = err
        .backend_context()
        .expect("backend failure carries its context");
    assert_eq!(operation, "create_identity");
    assert!(identity.starts_with("vault_"));
    assert!(identity.contains("_3f2a_"));
    assert_eq!(scope, "zone-a");

    let config_err = plugin
        .write_role("broken", DynamicRolePatch::default())
        .await
        .expect_err("invalid role");
    assert_eq!(config_err.backend_context(), None);
    Ok(())
}

#[tokio::test]
async fn issued_credentials_are_reclaimed_by_periodic_ticks() -> Result<()> {
    let (plugin, backend, clock) = plugin()?;
    plugin.write_config(global_patch()).await?;
    plugin.write_role("reader", reader_patch()).await?;

    let credential = plugin.issue_dynamic("reader", 0, None).await?;
    assert!(credential.expires());
    assert_eq!(backend.identities("zone-a"), vec![credential.username.clone()]);

    assert_eq!(plugin.periodic().await?, TickOutcome::Armed);
    clock.advance(TimeDelta::seconds(601));
    let TickOutcome::Swept(report) = plugin.periodic().await? else {
        panic!("sweep should be due");
    };
    assert_eq!(report.reclaimed.len(), 1);
    assert!(backend.identities("zone-a").is_empty());
    assert_eq!(plugin.metrics().credentials_issued("dynamic"), 1);
    Ok(())
}

#[tokio::test]
async fn writing_configuration_rearms_the_sweeper() -> Result<()> {
    let (plugin, _, clock) = plugin()?;
    plugin.write_config(global_patch()).await?;
    clock.advance(TimeDelta::seconds(10));
    assert_eq!(plugin.periodic().await?, TickOutcome::Armed);

    clock.advance(TimeDelta::seconds(490));
    plugin.write_config(GlobalConfigPatch::default()).await?;

    clock.advance(TimeDelta::seconds(200));
    assert_eq!(plugin.periodic().await?, TickOutcome::Armed);
    clock.advance(TimeDelta::seconds(399));
    assert_eq!(plugin.periodic().await?, TickOutcome::Idle);
    clock.advance(TimeDelta::seconds(2));
    assert!(matches!(plugin.periodic().await?, TickOutcome::Swept(_)));
    Ok(())
}

#[tokio::test]
async fn zero_tick_interval_is_rejected() -> Result<()> {
    let (plugin, _, _) = plugin()?;
    let err = spawn_periodic(Arc::new(plugin), Duration::ZERO)
        .expect_err("zero interval cannot drive a timer");
    assert!(matches!(err, PluginError::InvalidTickInterval { millis: 0 }));
    Ok(())
}

#[tokio::test]
async fn spawned_ticker_reclaims_expired_identities() -> Result<()> {
    let (plugin, backend, clock) = plugin()?;
    plugin.write_config(global_patch()).await?;
    plugin.write_role("reader", reader_patch()).await?;
    let expired = IdentityName::generate(
        "vault",
        "seed",
        NameStamp::expires_at(start() - TimeDelta::seconds(1)),
    )
    .to_string();
    backend.insert_identity("zone-a", &expired);

    let plugin = Arc::new(plugin);
    let handle = spawn_periodic(Arc::clone(&plugin), Duration::from_millis(5))?;
    tokio::time::sleep(Duration::from_millis(20)).await;
    clock.advance(TimeDelta::seconds(601));

    let mut remaining = backend.identities("zone-a");
    for _ in 0..200 {
        if remaining.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        remaining = backend.identities("zone-a");
    }
    handle.abort();
    assert!(remaining.is_empty(), "ticker never reclaimed {remaining:?}");
    Ok(())
}
