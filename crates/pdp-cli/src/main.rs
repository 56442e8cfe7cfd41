//! Command-line PDP: one-shot and streaming decisions against a directory of
//! `pdp.json` + `*.sapl` documents, plus bundle creation and verification.

#![deny(unsafe_code)]

mod compiler;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use compiler::MinimalDocumentCompiler;
use pdp_config::VoterSource;
use pdp_core::Value;
use pdp_decision::{AuthorizationSubscription, DecisionPoint};
use pdp_expr::{NoAttributes, NoFunctions};
use tokio_stream::StreamExt;

#[derive(Parser, Debug)]
#[command(name = "pdp", about = "Evaluate and package policy decision point configurations")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate one subscription against a directory configuration and print
    /// the resulting decision trace.
    Decide {
        /// Directory holding `pdp.json` and `*.sapl` documents.
        #[arg(short, long)]
        dir: PathBuf,
        #[arg(long, default_value = "default")]
        pdp_id: String,
        #[arg(long, default_value = "null")]
        subject: String,
        #[arg(long, default_value = "null")]
        action: String,
        #[arg(long, default_value = "null")]
        resource: String,
        #[arg(long, default_value = "{}")]
        environment: String,
    },
    /// Stream decisions for one subscription, re-evaluating on every reload
    /// of the directory configuration, until interrupted.
    Watch {
        #[arg(short, long)]
        dir: PathBuf,
        #[arg(long, default_value = "default")]
        pdp_id: String,
        #[arg(long, default_value = "null")]
        subject: String,
        #[arg(long, default_value = "null")]
        action: String,
        #[arg(long, default_value = "null")]
        resource: String,
        #[arg(long, default_value = "{}")]
        environment: String,
    },
    /// Build or verify `.saplbundle` archives.
    #[command(subcommand)]
    Bundle(BundleCommand),
}

#[derive(Subcommand, Debug)]
enum BundleCommand {
    /// Package a `pdp.json` and a directory of `*.sapl` documents into a
    /// `.saplbundle`, optionally signed.
    Create {
        #[arg(long)]
        pdp_json: PathBuf,
        #[arg(long)]
        sapl_dir: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
        /// Raw 32-byte Ed25519 signing key seed file. Omit to build unsigned.
        #[arg(long)]
        signing_key: Option<PathBuf>,
        #[arg(long, default_value = "default")]
        key_id: String,
    },
    /// Parse a `.saplbundle` and verify its `MANIFEST` signature.
    Verify {
        #[arg(short, long)]
        bundle: PathBuf,
        /// Raw 32-byte Ed25519 public key file.
        #[arg(long)]
        public_key: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pdp_telemetry::init_json_logging();
    pdp_policy::set_observer(Some(Box::new(pdp_telemetry::LoggingVoteObserver::new())));

    let cli = Cli::parse();
    match cli.cmd {
        Command::Decide { dir, pdp_id, subject, action, resource, environment } => {
            cmd_decide(&dir, &pdp_id, &subject, &action, &resource, &environment).await?;
        }
        Command::Watch { dir, pdp_id, subject, action, resource, environment } => {
            cmd_watch(&dir, &pdp_id, &subject, &action, &resource, &environment).await?;
        }
        Command::Bundle(BundleCommand::Create { pdp_json, sapl_dir, out, signing_key, key_id }) => {
            cmd_bundle_create(&pdp_json, &sapl_dir, &out, signing_key.as_deref(), &key_id)?;
        }
        Command::Bundle(BundleCommand::Verify { bundle, public_key }) => {
            cmd_bundle_verify(&bundle, &public_key)?;
        }
    }
    Ok(())
}

fn parse_value(json: &str) -> Result<Value, Box<dyn std::error::Error>> {
    Ok(Value::from_json(&serde_json::from_str(json)?))
}

fn build_point(
    dir: &std::path::Path,
    pdp_id: &str,
) -> Result<DecisionPoint<MinimalDocumentCompiler>, Box<dyn std::error::Error>> {
    let config = pdp_config::directory::build_configuration(dir, pdp_id)?;
    let point = DecisionPoint::new(MinimalDocumentCompiler);
    point.voter_source().load_configuration(config, true);
    Ok(point)
}

fn build_subscription(
    subject: &str,
    action: &str,
    resource: &str,
    environment: &str,
) -> Result<AuthorizationSubscription, Box<dyn std::error::Error>> {
    Ok(AuthorizationSubscription::new(
        parse_value(subject)?,
        parse_value(action)?,
        parse_value(resource)?,
        parse_value(environment)?,
    ))
}

async fn cmd_decide(
    dir: &std::path::Path,
    pdp_id: &str,
    subject: &str,
    action: &str,
    resource: &str,
    environment: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let point = build_point(dir, pdp_id)?;
    let subscription = build_subscription(subject, action, resource, environment)?;
    let mut stream = point.decide(subscription, pdp_id, Arc::new(NoFunctions), Arc::new(NoAttributes))?;
    match stream.next().await {
        Some(decision) => println!("{}", serde_json::to_string_pretty(&decision.trace.to_json())?),
        None => println!("{{}}"),
    }
    Ok(())
}

async fn cmd_watch(
    dir: &std::path::Path,
    pdp_id: &str,
    subject: &str,
    action: &str,
    resource: &str,
    environment: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let point = build_point(dir, pdp_id)?;
    let subscription = build_subscription(subject, action, resource, environment)?;
    let mut stream = point.decide(subscription, pdp_id, Arc::new(NoFunctions), Arc::new(NoAttributes))?;
    while let Some(decision) = stream.next().await {
        println!("{}", serde_json::to_string(&decision.trace.to_json())?);
    }
    Ok(())
}

fn cmd_bundle_create(
    pdp_json: &std::path::Path,
    sapl_dir: &std::path::Path,
    out: &std::path::Path,
    signing_key: Option<&std::path::Path>,
    key_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let pdp_json_bytes = std::fs::read(pdp_json)?;
    let created_at = now_rfc3339()?;
    let mut builder = pdp_bundle::BundleBuilder::new(pdp_json_bytes, created_at);

    let mut entries: Vec<_> = std::fs::read_dir(sapl_dir)?.filter_map(Result::ok).collect();
    entries.sort_by_key(std::fs::DirEntry::path);
    for entry in entries {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("sapl") {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
        builder = builder.with_document(name, std::fs::read(&path)?);
    }

    if let Some(key_path) = signing_key {
        let seed: [u8; 32] = std::fs::read(key_path)?.try_into().map_err(|_| "signing key must be 32 bytes")?;
        builder = builder.signed_with(ed25519_dalek::SigningKey::from_bytes(&seed), key_id);
    }

    std::fs::write(out, builder.build()?)?;
    println!("wrote bundle to {}", out.display());
    Ok(())
}

fn cmd_bundle_verify(bundle: &std::path::Path, public_key: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(bundle)?;
    let parsed = pdp_bundle::BundleParser::parse(&bytes)?;

    let key_bytes: [u8; 32] = std::fs::read(public_key)?.try_into().map_err(|_| "public key must be 32 bytes")?;
    let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes)?;
    parsed.verify(&verifying_key)?;

    println!("configurationId: {}", parsed.configuration_id());
    println!("documents: {}", parsed.sapl_documents.len());
    println!("signature: valid");
    Ok(())
}

fn now_rfc3339() -> Result<String, Box<dyn std::error::Error>> {
    let now = time::OffsetDateTime::now_utc();
    Ok(now.format(&time::format_description::well_known::Rfc3339)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_sample_dir(dir: &std::path::Path) {
        std::fs::write(dir.join("pdp.json"), br#"{"algorithm":{"votingMode":"PRIORITY_PERMIT"}}"#).unwrap();
        std::fs::write(dir.join("p1.sapl"), "permit").unwrap();
    }

    #[tokio::test]
    async fn decide_permits_against_a_minimal_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_sample_dir(dir.path());

        let point = build_point(dir.path(), "default").unwrap();
        let subscription = build_subscription("\"alice\"", "\"read\"", "\"doc1\"", "{}").unwrap();
        let mut stream =
            point.decide(subscription, "default", Arc::new(NoFunctions), Arc::new(NoAttributes)).unwrap();
        let decision = stream.next().await.unwrap();
        assert_eq!(decision.decision, pdp_policy::Outcome::Permit);
    }

    #[test]
    fn bundle_round_trips_through_create_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let sapl_dir = dir.path().join("policies");
        std::fs::create_dir(&sapl_dir).unwrap();
        std::fs::write(sapl_dir.join("p1.sapl"), "permit").unwrap();
        let pdp_json = dir.path().join("pdp.json");
        std::fs::write(&pdp_json, b"{}").unwrap();

        let seed = [9u8; 32];
        let key_path = dir.path().join("key.bin");
        std::fs::write(&key_path, seed).unwrap();
        let public_path = dir.path().join("key.pub");
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&seed);
        std::fs::write(&public_path, signing_key.verifying_key().to_bytes()).unwrap();

        let out = dir.path().join("bundle.saplbundle");
        cmd_bundle_create(&pdp_json, &sapl_dir, &out, Some(&key_path), "k1").unwrap();
        cmd_bundle_verify(&out, &public_path).unwrap();
    }
}
