//! Fetch: advertisement, ref mapping, negotiation, ingest, ref updates.

use std::collections::HashSet;

use grove_hash::ObjectId;
use grove_ref::{Expected, RefName, RefUpdate, UpdateOutcome};
use grove_repository::Repository;
use grove_transport::Transport;
use grove_utils::CancellationToken;

use crate::advertise::{advertise, Advertisement};
use crate::ingest::{ingest, IngestReport};
use crate::negotiate::negotiate;
use crate::pktline::PktLineWriter;
use crate::refspec::RefSpec;
use crate::ProtocolError;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Remote name used by the default refspec.
    pub remote: String,
    /// Ref mappings; empty means `+refs/heads/*:refs/remotes/<remote>/*`.
    pub refspecs: Vec<RefSpec>,
    /// Also create local tags for advertised tags whose objects arrived.
    pub follow_tags: bool,
    pub cancel: CancellationToken,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            remote: "origin".into(),
            refspecs: Vec::new(),
            follow_tags: true,
            cancel: CancellationToken::new(),
        }
    }
}

/// What happened to one local ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefOutcome {
    pub remote: RefName,
    pub local: RefName,
    pub old: Option<ObjectId>,
    pub new: ObjectId,
    pub outcome: UpdateOutcome,
}

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub advertisement: Advertisement,
    /// `None` when nothing needed to be transferred.
    pub pack: Option<IngestReport>,
    pub updates: Vec<RefOutcome>,
}

impl FetchResult {
    /// The remote branch the server's `HEAD` names.
    pub fn guess_head(&self) -> Option<RefName> {
        self.advertisement.guess_head()
    }

    pub fn rejected(&self) -> impl Iterator<Item = &RefOutcome> {
        self.updates.iter().filter(|u| u.outcome.is_rejected())
    }
}

struct Mapping {
    remote: RefName,
    local: RefName,
    id: ObjectId,
    force: bool,
}

/// Fetch from the peer on `transport` into `repo`.
///
/// The pack is installed before any ref moves, and refs only move once
/// every wanted object is present. A failed transfer leaves both the object
/// store and the refs as they were.
pub fn fetch(
    repo: &Repository,
    transport: &mut dyn Transport,
    options: &FetchOptions,
) -> Result<FetchResult, ProtocolError> {
    let adv = advertise(transport)?;

    let default_spec;
    let refspecs = if options.refspecs.is_empty() {
        default_spec = [RefSpec::default_for(&options.remote)];
        &default_spec[..]
    } else {
        &options.refspecs[..]
    };

    let mut mappings = Vec::new();
    for (name, id) in &adv.refs {
        if let Some((spec, local)) = refspecs.iter().find_map(|s| s.map(name).map(|l| (s, l))) {
            mappings.push(Mapping {
                remote: name.clone(),
                local,
                id: *id,
                force: spec.force,
            });
        }
    }

    let odb = repo.odb();
    let mut seen = HashSet::new();
    let wants: Vec<ObjectId> = mappings
        .iter()
        .map(|m| m.id)
        .filter(|id| !odb.has(id) && seen.insert(*id))
        .collect();
    let haves = local_tips(repo)?;
    tracing::debug!(
        refs = adv.refs.len(),
        mapped = mappings.len(),
        wants = wants.len(),
        haves = haves.len(),
        "fetch plan"
    );

    let pack = if wants.is_empty() {
        let mut out = PktLineWriter::new(transport.writer());
        out.write_flush()?;
        out.flush()?;
        None
    } else {
        options.cancel.check()?;
        match negotiate(transport, &adv.capabilities, &wants, &haves)? {
            Some(stream) => Some(ingest(odb, stream, &options.cancel)?),
            None => None,
        }
    };

    for want in &wants {
        if !odb.has(want) {
            return Err(ProtocolError::Incomplete(*want));
        }
    }

    let ancestry = repo.ancestry();
    let mut updates = Vec::with_capacity(mappings.len());
    for m in mappings {
        let old = repo.refs().try_resolve(&m.local)?;
        let update = RefUpdate::new(m.local.clone(), m.id).force(m.force);
        let outcome = repo.refs().update(&update, &ancestry)?;
        if outcome.is_rejected() {
            tracing::warn!(local = %m.local, remote = %m.remote, ?outcome, "ref update rejected");
        }
        updates.push(RefOutcome {
            remote: m.remote,
            local: m.local,
            old,
            new: m.id,
            outcome,
        });
    }

    if options.follow_tags {
        updates.extend(follow_tags(repo, &adv)?);
    }

    tracing::info!(
        objects = pack.as_ref().map_or(0, |p| p.objects),
        updated = updates.iter().filter(|u| u.outcome != UpdateOutcome::NoChange).count(),
        "fetch complete"
    );
    Ok(FetchResult {
        advertisement: adv,
        pack,
        updates,
    })
}

/// Commits the local side already has: every ref tip and `HEAD`.
fn local_tips(repo: &Repository) -> Result<Vec<ObjectId>, ProtocolError> {
    let mut seen = HashSet::new();
    let mut tips = Vec::new();
    if let Some(head) = repo.head_commit()? {
        seen.insert(head);
        tips.push(head);
    }
    for (_, id) in repo.refs().list("refs/")? {
        if seen.insert(id) && repo.odb().has(&id) {
            tips.push(id);
        }
    }
    Ok(tips)
}

/// Create advertised tags whose objects are now present, leaving existing
/// local tags alone.
fn follow_tags(repo: &Repository, adv: &Advertisement) -> Result<Vec<RefOutcome>, ProtocolError> {
    let ancestry = repo.ancestry();
    let mut created = Vec::new();
    for (name, id) in adv.refs.iter().filter(|(n, _)| n.is_tag()) {
        if !repo.odb().has(id) || repo.refs().try_resolve(name)?.is_some() {
            continue;
        }
        let update = RefUpdate::new(name.clone(), *id).expect(Expected::Missing);
        let outcome = repo.refs().update(&update, &ancestry)?;
        tracing::debug!(tag = %name, ?outcome, "followed tag");
        created.push(RefOutcome {
            remote: name.clone(),
            local: name.clone(),
            old: None,
            new: *id,
            outcome,
        });
    }
    Ok(created)
}
