//! Kickoff Engine Demo
//!
//! Runs one full match against the seeded local randomness provider, then
//! replays the transcript to check the outcome is reproducible.

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use kickoff::{
    auth::AuthConfig,
    game::events::MatchEventData,
    oracle::LocalOracle,
    proof::verify_transcript,
    registry::InMemoryRegistry,
    service::MatchService,
    AccessPolicy, AccountId, EngineConfig, MatchController, MatchStatus, PlayerAttributes,
    PlayerId, SEGMENT_COUNT, VERSION,
};

const ADMIN: AccountId = AccountId::new([0xad; 16]);
const RELAY: AccountId = AccountId::new([0x0c; 16]);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    let config = EngineConfig::from_env().context("invalid engine configuration")?;
    let seed: u64 = match std::env::var("KICKOFF_DEMO_SEED") {
        Ok(value) => value.parse().context("KICKOFF_DEMO_SEED must be an integer")?,
        Err(_) => 20_240_601,
    };

    info!("Kickoff Engine v{}", VERSION);
    info!("Segments: {}, progression: {:?}, seed: {}", SEGMENT_COUNT, config.progression, seed);

    let (home, away, registry) = mint_squads();
    let controller = MatchController::new(config, AccessPolicy::new(ADMIN, RELAY), LocalOracle::new(seed), registry);
    let service = MatchService::new(controller, RELAY, AuthConfig::from_env());

    let match_id = service
        .create_match(ADMIN, home.clone(), away.clone(), 1, 2, 4)
        .await
        .context("match creation failed")?;
    info!("=== Match {} created ===", match_id);

    let mut status = service.run_to_completion(match_id).await?;
    while status == MatchStatus::Cooldown {
        service.trigger_next_segment(ADMIN, match_id).await?;
        status = service.run_to_completion(match_id).await?;
    }
    if status != MatchStatus::Concluded {
        bail!("match {} stopped in {}", match_id, status);
    }

    for event in service.events_since(0).await {
        match event.data {
            MatchEventData::GoalScored { segment, side, player_id, home_score, away_score } => {
                info!("Segment {}: goal {} by {} ({}-{})", segment, side, player_id, home_score, away_score);
            }
            MatchEventData::ExperienceAwarded { player_id, amount } => {
                info!("Player {} earned {} xp", player_id, amount);
            }
            _ => {}
        }
    }

    let m = service.get_match(match_id).await.context("match disappeared")?;
    info!("=== Final score {}-{} ===", m.home.score, m.away.score);
    info!("Final State Hash: {}", hex::encode(m.compute_hash()));

    info!("=== Verifying Determinism ===");
    let transcript = service.transcript(match_id).await.context("transcript missing")?;
    let bytes = transcript.to_bytes()?;
    info!("Transcript size: {} bytes", bytes.len());

    let result = verify_transcript(&kickoff::proof::MatchTranscript::from_bytes(&bytes)?);
    info!("Replay State Hash: {}", hex::encode(result.computed_final_hash));
    if !result.valid {
        bail!("determinism failure: {:?}", result.error);
    }
    info!("DETERMINISM VERIFIED: Hashes match!");

    service
        .with_controller(|c| {
            for id in home.iter().chain(&away) {
                if let Some(record) = c.registry().record(*id) {
                    info!("Player {}: {} xp, tier {:?}", id, record.experience, record.tier);
                }
            }
        })
        .await;

    Ok(())
}

/// Two full elevens with spread attributes.
fn mint_squads() -> (Vec<PlayerId>, Vec<PlayerId>, InMemoryRegistry) {
    let mut registry = InMemoryRegistry::new();
    let home_owner = AccountId::generate();
    let away_owner = AccountId::generate();

    let home = (0..11u32)
        .map(|i| registry.mint(home_owner, PlayerAttributes::new(90 + i * 7, 140 - i * 5).with_form(40 + i * 2)))
        .collect();
    let away = (0..11u32)
        .map(|i| registry.mint(away_owner, PlayerAttributes::new(100 + i * 5, 120 - i * 3).with_form(55)))
        .collect();

    (home, away, registry)
}
