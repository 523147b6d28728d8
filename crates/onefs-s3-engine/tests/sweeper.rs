use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use onefs_s3_config::{ConfigService, DynamicRolePatch, GlobalConfigPatch, MemoryStore};
use onefs_s3_core::{IdentityName, NameStamp};
use onefs_s3_engine::{
    CredentialMinter, EngineError, ExpirySweeper, ReclaimFailure, SweepReport, TickOutcome,
};
use onefs_s3_telemetry::Metrics;
use onefs_s3_test_support::{BackendOperation, ManualClock, MemoryIdentityBackend};

struct Harness {
    config: ConfigService,
    backend: MemoryIdentityBackend,
    clock: ManualClock,
    metrics: Metrics,
    minter: CredentialMinter,
    sweeper: ExpirySweeper,
}

fn start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

fn harness() -> Result<Harness> {
    let clock = ManualClock::new(start());
    let config = ConfigService::new(Arc::new(MemoryStore::new()));
    let backend = MemoryIdentityBackend::with_clock(Arc::new(clock.clone()));
    let metrics = Metrics::new()?;
    let minter = CredentialMinter::new(
        config.clone(),
        Arc::new(backend.clone()),
        Arc::new(clock.clone()),
        metrics.clone(),
    );
    let sweeper = ExpirySweeper::new(
        config.clone(),
        Arc::new(backend.clone()),
        Arc::new(clock.clone()),
        metrics.clone(),
    );
    Ok(Harness {
        config,
        backend,
        clock,
        metrics,
        minter,
        sweeper,
    })
}

async fn configure(harness: &Harness, cleanup_period: i64) -> Result<()> {
    harness
        .config
        .write_global(GlobalConfigPatch {
            cleanup_period: Some(cleanup_period),
            ttl: Some(300),
            ..GlobalConfigPatch::default()
        })
        .await?;
    Ok(())
}

async fn role(harness: &Harness, name: &str, zone: &str) -> Result<()> {
    harness
        .config
        .write_role(
            name,
            DynamicRolePatch {
                bucket: Some("b1".to_string()),
                groups: Some(vec!["s3-readers".to_string()]),
                access_zone: Some(zone.to_string()),
                ..DynamicRolePatch::default()
            },
        )
        .await?;
    Ok(())
}

fn expiring_name(at: DateTime<Utc>) -> String {
    IdentityName::generate("vault", "seed", NameStamp::expires_at(at)).to_string()
}

fn reclaimed_names(report: &SweepReport) -> Vec<&str> {
    report
        .reclaimed
        .iter()
        .map(|identity| identity.name.as_str())
        .collect()
}

#[tokio::test]
async fn issued_identity_is_reclaimed_only_after_its_lease() -> Result<()> {
    let harness = harness()?;
    configure(&harness, 600).await?;
    role(&harness, "reader", "zone-a").await?;

    let credential = harness.minter.issue_dynamic("reader", 0, "abcd").await?;

    harness.clock.advance(TimeDelta::seconds(100));
    let early = harness.sweeper.sweep_now().await?;
    assert!(early.reclaimed.is_empty());
    assert_eq!(harness.backend.identities("zone-a"), vec![credential.username.clone()]);

    harness.clock.advance(TimeDelta::seconds(201));
    let late = harness.sweeper.sweep_now().await?;
    assert_eq!(reclaimed_names(&late), vec![credential.username.as_str()]);
    assert_eq!(late.reclaimed[0].expired_at, start() + TimeDelta::seconds(300));
    assert!(harness.backend.identities("zone-a").is_empty());
    assert_eq!(harness.metrics.snapshot().identities_reclaimed_total, 1);
    Ok(())
}

#[tokio::test]
async fn identity_expiring_exactly_now_survives() -> Result<()> {
    let harness = harness()?;
    configure(&harness, 600).await?;
    role(&harness, "reader", "zone-a").await?;
    let name = expiring_name(start() + TimeDelta::seconds(60));
    harness.backend.insert_identity("zone-a", &name);

    harness.clock.advance(TimeDelta::seconds(60));
    assert!(harness.sweeper.sweep_now().await?.reclaimed.is_empty());

    harness.clock.advance(TimeDelta::seconds(1));
    let report = harness.sweeper.sweep_now().await?;
    assert_eq!(reclaimed_names(&report), vec![name.as_str()]);
    Ok(())
}

#[tokio::test]
async fn unlimited_and_foreign_identities_are_left_alone() -> Result<()> {
    let harness = harness()?;
    configure(&harness, 600).await?;
    role(&harness, "reader", "zone-a").await?;
    let unlimited = IdentityName::generate(
        "vault",
        "seed",
        NameStamp::unlimited_since(start() - TimeDelta::days(365)),
    )
    .to_string();
    for name in [
        unlimited.as_str(),
        "alice",
        "other_abcdef_abcd_20200101000000",
        "vault_too_many_parts_here_20200101000000",
    ] {
        harness.backend.insert_identity("zone-a", name);
    }

    let report = harness.sweeper.sweep_now().await?;
    assert_eq!(report.identities_seen, 4);
    assert!(report.reclaimed.is_empty());
    assert!(report.failures.is_empty());
    assert_eq!(harness.backend.identities("zone-a").len(), 4);
    assert!(
        harness
            .backend
            .calls_of(BackendOperation::DeleteIdentity)
            .is_empty()
    );
    Ok(())
}

#[tokio::test]
async fn list_and_delete_failures_do_not_stop_the_sweep() -> Result<()> {
    let harness = harness()?;
    configure(&harness, 600).await?;
    role(&harness, "reader", "zone-a").await?;
    role(&harness, "writer", "zone-b").await?;
    role(&harness, "auditor", "zone-c").await?;

    let expired = start() - TimeDelta::seconds(1);
    let stuck = expiring_name(expired);
    let freed = expiring_name(expired);
    harness.backend.insert_identity("zone-a", &stuck);
    harness.backend.insert_identity("zone-b", &expiring_name(expired));
    harness.backend.insert_identity("zone-c", &freed);
    harness
        .backend
        .fail_for(BackendOperation::DeleteIdentity, &stuck);
    harness
        .backend
        .fail_for(BackendOperation::ListIdentities, "zone-b");

    let report = harness.sweeper.sweep_now().await?;
    assert_eq!(report.scopes_scanned, 3);
    assert_eq!(reclaimed_names(&report), vec![freed.as_str()]);
    assert_eq!(report.failures.len(), 2);
    assert!(matches!(
        &report.failures[0],
        ReclaimFailure::DeleteIdentity { name, scope, .. } if *name == stuck && scope == "zone-a"
    ));
    assert!(matches!(
        &report.failures[1],
        ReclaimFailure::ListIdentities { scope, .. } if scope == "zone-b"
    ));
    assert_eq!(harness.backend.identities("zone-a"), vec![stuck]);
    assert_eq!(harness.backend.identities("zone-b").len(), 1);
    assert_eq!(harness.metrics.snapshot().reclaim_failures_total, 2);
    Ok(())
}

#[tokio::test]
async fn undecodable_owned_name_aborts_the_sweep() -> Result<()> {
    let mut harness = harness()?;
    configure(&harness, 600).await?;
    role(&harness, "reader", "zone-a").await?;
    harness
        .backend
        .insert_identity("zone-a", "vault_abcdef_abcd_20241301000000");

    harness.clock.advance(TimeDelta::seconds(601));
    let err = harness
        .sweeper
        .tick()
        .await
        .expect_err("month 13 must not decode");
    assert!(matches!(
        err,
        EngineError::Codec {
            operation: "decode_identity_name",
            ..
        }
    ));
    assert_eq!(harness.metrics.snapshot().sweep_aborts_total, 1);

    let schedule = harness.sweeper.schedule().expect("schedule stays armed");
    assert_eq!(schedule.next_sweep_at(), start() + TimeDelta::seconds(1_200));
    assert_eq!(harness.sweeper.tick().await?, TickOutcome::Idle);
    Ok(())
}

#[tokio::test]
async fn ticks_sweep_once_per_period_without_drift() -> Result<()> {
    let mut harness = harness()?;
    configure(&harness, 600).await?;
    role(&harness, "reader", "zone-a").await?;

    harness.clock.advance(TimeDelta::seconds(10));
    assert_eq!(harness.sweeper.tick().await?, TickOutcome::Armed);
    assert_eq!(
        harness.sweeper.schedule().map(|schedule| schedule.next_sweep_at()),
        Some(start() + TimeDelta::seconds(600))
    );

    harness.clock.set(start() + TimeDelta::seconds(600));
    assert_eq!(harness.sweeper.tick().await?, TickOutcome::Idle);

    harness.clock.set(start() + TimeDelta::seconds(601));
    assert!(matches!(
        harness.sweeper.tick().await?,
        TickOutcome::Swept(_)
    ));
    assert_eq!(harness.sweeper.tick().await?, TickOutcome::Idle);

    // Ticks stop for several periods, then resume.
    let resumed = start() + TimeDelta::seconds(4_000);
    harness.clock.set(resumed);
    assert!(matches!(
        harness.sweeper.tick().await?,
        TickOutcome::Swept(_)
    ));
    assert_eq!(harness.sweeper.tick().await?, TickOutcome::Idle);
    let next = harness
        .sweeper
        .schedule()
        .map(|schedule| schedule.next_sweep_at())
        .expect("schedule armed");
    assert_eq!(next, start() + TimeDelta::seconds(4_200));
    assert!(next > resumed);

    assert_eq!(harness.metrics.snapshot().sweeps_total, 2);
    assert_eq!(
        harness
            .backend
            .calls_of(BackendOperation::ListIdentities)
            .len(),
        2
    );
    Ok(())
}

#[tokio::test]
async fn rearm_restarts_the_period_from_now() -> Result<()> {
    let mut harness = harness()?;
    configure(&harness, 600).await?;
    assert_eq!(harness.sweeper.tick().await?, TickOutcome::Armed);

    harness.clock.advance(TimeDelta::seconds(500));
    harness.sweeper.rearm();
    assert_eq!(harness.sweeper.schedule(), None);

    harness.clock.advance(TimeDelta::seconds(200));
    assert_eq!(harness.sweeper.tick().await?, TickOutcome::Armed);
    assert_eq!(
        harness.sweeper.schedule().map(|schedule| schedule.next_sweep_at()),
        Some(start() + TimeDelta::seconds(1_100))
    );
    Ok(())
}

#[tokio::test]
async fn changed_period_takes_effect_on_next_tick() -> Result<()> {
    let mut harness = harness()?;
    configure(&harness, 600).await?;
    assert_eq!(harness.sweeper.tick().await?, TickOutcome::Armed);

    configure(&harness, 60).await?;
    harness.clock.advance(TimeDelta::seconds(30));
    assert_eq!(harness.sweeper.tick().await?, TickOutcome::Armed);
    let schedule = harness.sweeper.schedule().expect("schedule armed");
    assert_eq!(schedule.period(), TimeDelta::seconds(60));
    assert_eq!(schedule.next_sweep_at(), start() + TimeDelta::seconds(60));
    Ok(())
}

#[tokio::test]
async fn sweeping_is_disabled_without_config_or_period() -> Result<()> {
    let mut harness = harness()?;
    harness.clock.advance(TimeDelta::days(1));
    assert_eq!(harness.sweeper.tick().await?, TickOutcome::Disabled);
    assert!(matches!(
        harness.sweeper.sweep_now().await,
        Err(EngineError::NotConfigured)
    ));

    configure(&harness, -1).await?;
    harness.clock.advance(TimeDelta::days(1));
    assert_eq!(harness.sweeper.tick().await?, TickOutcome::Disabled);
    assert_eq!(harness.sweeper.schedule(), None);
    assert!(harness.backend.calls().is_empty());
    Ok(())
}
