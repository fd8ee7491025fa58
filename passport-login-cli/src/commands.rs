use std::{fmt::Write as _, path::PathBuf, str::FromStr};

use clap::Args;
use eyre::{bail, eyre, WrapErr};
use passport_login_core::{
    codec::{self, Snapshot, StoredLogin},
    merkle_tree::{default_hasher, PoseidonHasher, Sha256Hasher, TreeHasher},
    AnonymousLogin, FieldElement, GroupMembershipPcd, GroupSource, HttpPassportServer,
    LoginMachine, LoginRequest, NamedGroup, PassportConfig, PcdError, ProofVerifier,
    SemaphoreGroup, SignaturePcd,
};
use tracing::{debug, warn};
use url::Url;

/// Reads PCD payloads in their JSON layout. Proofs cannot be verified from the command line, so
/// every verification fails.
struct PayloadReader;

impl ProofVerifier for PayloadReader {
    async fn deserialize_group_proof(&self, payload: &str) -> Result<GroupMembershipPcd, PcdError> {
        GroupMembershipPcd::from_json(payload)
    }

    async fn verify_group_proof(&self, _pcd: &GroupMembershipPcd) -> Result<bool, PcdError> {
        Err(PcdError::Verify("no verifier available".to_string()))
    }

    async fn deserialize_signature_proof(&self, payload: &str) -> Result<SignaturePcd, PcdError> {
        SignaturePcd::from_json(payload)
    }

    async fn verify_signature_proof(&self, _pcd: &SignaturePcd) -> Result<bool, PcdError> {
        Err(PcdError::Verify("no verifier available".to_string()))
    }
}

fn machine(config: PassportConfig) -> LoginMachine<PayloadReader, HttpPassportServer> {
    let server = HttpPassportServer::new(config.clone());
    LoginMachine::new(config, PayloadReader, server)
}

/// Where a command takes its group from.
#[derive(Args, Debug)]
pub struct GroupArgs {
    /// A named group (participants, residents, visitors, organizers) or a group URL.
    #[arg(long, default_value = "participants")]
    group: String,

    /// Read the group from a JSON file instead.
    #[arg(long, conflicts_with = "group")]
    group_file: Option<PathBuf>,
}

impl GroupArgs {
    fn source(&self) -> eyre::Result<GroupSource> {
        if let Some(path) = &self.group_file {
            let json = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("reading {}", path.display()))?;
            let group: SemaphoreGroup = serde_json::from_str(&json)
                .wrap_err_with(|| format!("parsing group {}", path.display()))?;
            return Ok(GroupSource::Inline(group));
        }
        parse_group_source(&self.group)
    }
}

fn parse_group_source(value: &str) -> eyre::Result<GroupSource> {
    if let Ok(named) = NamedGroup::from_str(value) {
        return Ok(GroupSource::Named(named));
    }
    Url::parse(value)
        .map(GroupSource::Url)
        .map_err(|e| eyre!("{value} is neither a named group nor a URL: {e}"))
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Snapshot file to decode.
    snapshot: PathBuf,

    /// Also deserialize the stored PCD, as a reload would.
    #[arg(long)]
    check_payload: bool,
}

pub async fn inspect(config: &PassportConfig, args: &InspectArgs) -> eyre::Result<()> {
    let raw = std::fs::read_to_string(&args.snapshot)
        .wrap_err_with(|| format!("reading {}", args.snapshot.display()))?;
    let snapshot = codec::deserialize(&raw).map_err(|e| eyre!("snapshot rejected: {e}"))?;
    debug!(path = %args.snapshot.display(), "decoded snapshot");

    print!("{}", describe(&snapshot));

    if args.check_payload {
        machine(config.clone())
            .restore(snapshot)
            .await
            .map_err(|e| eyre!("stored pcd does not deserialize: {e}"))?;
        println!("payload: ok");
    }
    Ok(())
}

fn describe(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    match snapshot {
        Snapshot::LoggedOut => out.push_str("status: logged-out\n"),
        Snapshot::LoggingIn { anonymous } => {
            out.push_str("status: logging-in (discarded on reload)\n");
            if let Some(anonymous) = anonymous {
                let _ = writeln!(out, "anonymous: {anonymous}");
            }
        }
        Snapshot::LoggedIn(StoredLogin::Identified {
            participant,
            serialized,
        }) => {
            out.push_str("status: logged-in\nanonymous: false\n");
            let _ = writeln!(out, "participant: {}", participant.uuid());
            let _ = writeln!(out, "commitment: {}", participant.commitment());
            let _ = writeln!(out, "pcd type: {}", serialized.pcd_type);
        }
        Snapshot::LoggedIn(StoredLogin::Anonymous {
            binding,
            serialized,
        }) => {
            out.push_str("status: logged-in\nanonymous: true\n");
            let _ = writeln!(
                out,
                "group: {} ({} members, depth {})",
                binding.group.id,
                binding.group.members.len(),
                binding.group.depth
            );
            if let Some(url) = &binding.group_url {
                let _ = writeln!(out, "group url: {url}");
            }
            let _ = writeln!(out, "signal: {}", binding.signal);
            let _ = writeln!(out, "external nullifier: {}", binding.external_nullifier);
            let _ = writeln!(out, "pcd type: {}", serialized.pcd_type);
        }
    }
    out
}

#[derive(Args, Debug)]
pub struct RequestUrlArgs {
    /// Request an anonymous group membership proof instead of a signature.
    #[arg(long)]
    anonymous: bool,

    #[command(flatten)]
    group: GroupArgs,

    /// Signal bound into an anonymous proof.
    #[arg(long)]
    signal: Option<FieldElement>,

    /// External nullifier scoping an anonymous proof.
    #[arg(long)]
    external_nullifier: Option<FieldElement>,

    /// Also print the request descriptor.
    #[arg(long)]
    json: bool,
}

impl RequestUrlArgs {
    fn login_request(&self) -> eyre::Result<LoginRequest> {
        if !self.anonymous {
            return Ok(LoginRequest::Identified);
        }
        Ok(LoginRequest::Anonymous(AnonymousLogin {
            group: self.group.source()?,
            signal: self.signal,
            external_nullifier: self.external_nullifier,
        }))
    }
}

pub async fn request_url(config: PassportConfig, args: RequestUrlArgs) -> eyre::Result<()> {
    let start = machine(config).start_login(args.login_request()?).await?;
    let popup = start
        .popup
        .ok_or_else(|| eyre!("login request did not produce a popup"))?;

    println!("{}", popup.window_url);
    if args.json {
        println!("{}", popup.request.to_json()?);
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct GroupRootArgs {
    #[command(flatten)]
    group: GroupArgs,

    /// Tree hasher: `poseidon` (default, as in semaphore circuits) or `sha256`.
    #[arg(long)]
    hasher: Option<String>,
}

fn hasher(name: Option<&str>) -> eyre::Result<Box<dyn TreeHasher>> {
    match name {
        None => Ok(default_hasher()),
        Some("poseidon") => Ok(Box::new(PoseidonHasher)),
        Some("sha256") => {
            warn!("sha256 roots are not semaphore roots, no passport proof commits to them");
            Ok(Box::new(Sha256Hasher))
        }
        Some(other) => bail!("unknown hasher {other}"),
    }
}

pub async fn group_root(config: PassportConfig, args: GroupRootArgs) -> eyre::Result<()> {
    let machine = machine(config).with_hasher(hasher(args.hasher.as_deref())?);
    let group = machine.resolve_group(args.group.source()?).await?;
    debug!(?machine, group = %group.id, "computing group root");
    let root = machine.group_root(&group)?;

    println!("members: {}", group.members.len());
    println!("depth: {}", group.depth);
    println!("root: {root}");
    println!("root (hex): {}", root.to_hex_string());
    Ok(())
}
