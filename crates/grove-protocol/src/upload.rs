//! The serving side of fetch.

use std::collections::{HashMap, HashSet};
use std::io::{BufWriter, Write};

use bstr::{BString, ByteSlice, ByteVec};
use grove_hash::ObjectId;
use grove_object::ObjectKind;
use grove_odb::{ObjectDatabase, ObjectSource};
use grove_pack::{delta, PackWriter};
use grove_ref::RefName;
use grove_repository::Repository;
use grove_revwalk::ReachableObject;
use grove_transport::Transport;

use crate::advertise::Advertisement;
use crate::capability::Capabilities;
use crate::pktline::{PktLine, PktLineReader, PktLineWriter};
use crate::sideband::{write_band, Band, SidebandWriter, MAX_BAND_DATA_LEN};
use crate::{chomp, ProtocolError, AGENT};

/// What one upload session did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub wants: usize,
    pub common: usize,
    pub objects: usize,
    /// Objects sent as deltas against bases the client already has.
    pub thin_deltas: usize,
}

/// Serves one fetch from a repository.
pub struct UploadPack<'r> {
    repo: &'r Repository,
}

impl<'r> UploadPack<'r> {
    pub fn new(repo: &'r Repository) -> Self {
        Self { repo }
    }

    /// `HEAD` first, then every ref under `refs/`, with peeled targets of
    /// annotated tags.
    pub fn advertisement(&self) -> Result<Advertisement, ProtocolError> {
        let refs = self.repo.refs();
        let odb = self.repo.odb();
        let mut adv = Advertisement::default();

        if let Some(head) = refs.try_resolve(&RefName::head())? {
            adv.refs.push((RefName::head(), head));
        }
        for (name, id) in refs.list("refs/")? {
            if name.is_tag() {
                if let Ok((peeled, _)) = odb.peel(&id) {
                    if peeled != id {
                        adv.peeled.insert(name.clone(), peeled);
                    }
                }
            }
            adv.refs.push((name, id));
        }

        let mut caps = Capabilities::default();
        for name in ["thin-pack", "side-band-64k", "ofs-delta", "include-tag", "no-progress"] {
            caps.push(name, None);
        }
        if let Some(branch) = self.repo.head_branch()? {
            caps.push("symref", Some(&format!("HEAD:{}", branch)));
        }
        caps.push("agent", Some(AGENT));
        adv.capabilities = caps;
        Ok(adv)
    }

    /// Run one session: advertise, read wants and haves, send the pack.
    ///
    /// A client that hangs up after the advertisement, or sends no wants,
    /// ends the session without a pack.
    pub fn serve(&self, transport: &mut dyn Transport) -> Result<UploadReport, ProtocolError> {
        let adv = self.advertisement()?;
        adv.write_to(&mut PktLineWriter::new(transport.writer()))?;

        let Some((wants, requested)) = read_wants(transport)? else {
            tracing::debug!("client sent no wants");
            return Ok(UploadReport::default());
        };
        for want in &wants {
            if !adv.offers(want) {
                let mut out = PktLineWriter::new(transport.writer());
                out.write_text(&format!("ERR upload-pack: not our ref {}", want))?;
                out.flush()?;
                return Err(ProtocolError::NotOurRef(*want));
            }
        }

        let common = self.read_haves(transport)?;
        let objects = self.select_objects(&adv, &wants, &common, requested.has("include-tag"))?;
        let bases = if requested.has("thin-pack") {
            self.have_blobs(&common)?
        } else {
            HashMap::new()
        };

        let writer = transport.writer();
        let thin_deltas = if requested.has("side-band-64k") {
            let mut pkt = PktLineWriter::new(&mut *writer);
            if !requested.has("no-progress") {
                let message = format!("Enumerating objects: {}, done.\n", objects.len());
                write_band(&mut pkt, Band::Progress, message.as_bytes())?;
            }
            let framed = BufWriter::with_capacity(MAX_BAND_DATA_LEN, SidebandWriter::new(&mut *writer));
            let (framed, thin) = self.write_pack(framed, &objects, &bases)?;
            framed.into_inner().map_err(|e| e.into_error())?;
            let mut pkt = PktLineWriter::new(&mut *writer);
            pkt.write_flush()?;
            pkt.flush()?;
            thin
        } else {
            let (mut raw, thin) = self.write_pack(&mut *writer, &objects, &bases)?;
            raw.flush()?;
            thin
        };

        let report = UploadReport {
            wants: wants.len(),
            common: common.len(),
            objects: objects.len(),
            thin_deltas,
        };
        tracing::info!(
            wants = report.wants,
            common = report.common,
            objects = report.objects,
            thin_deltas = report.thin_deltas,
            "sent pack"
        );
        Ok(report)
    }

    /// Answer haves until `done`. Returns the haves found locally.
    ///
    /// Single-ACK mode: the first common have is acknowledged at once and
    /// nothing else is acknowledged. Until then every flush, and `done`,
    /// gets `NAK`; afterwards they get no reply.
    fn read_haves(&self, transport: &mut dyn Transport) -> Result<Vec<ObjectId>, ProtocolError> {
        let odb = self.repo.odb();
        let mut common: Vec<ObjectId> = Vec::new();

        loop {
            let pkt = PktLineReader::new(transport.reader()).read_pkt()?;
            let mut out = PktLineWriter::new(transport.writer());
            match pkt {
                PktLine::Data(line) => {
                    let line = chomp(&line);
                    if line == b"done" {
                        // After an ACK the pack follows `done` directly.
                        if common.is_empty() {
                            out.write_text("NAK")?;
                            out.flush()?;
                        }
                        return Ok(common);
                    }
                    let hex = line.strip_prefix(b"have ").ok_or_else(|| {
                        ProtocolError::UnexpectedPacket(line.to_str_lossy().into_owned())
                    })?;
                    let id = ObjectId::from_hex(hex)?;
                    if odb.has(&id) {
                        if common.is_empty() {
                            out.write_text(&format!("ACK {}", id))?;
                            out.flush()?;
                        }
                        common.push(id);
                    }
                }
                PktLine::Flush => {
                    if common.is_empty() {
                        out.write_text("NAK")?;
                        out.flush()?;
                    }
                }
                other => {
                    return Err(ProtocolError::UnexpectedPacket(format!("{:?}", other)));
                }
            }
        }
    }

    /// Objects reachable from the wants and not from the common haves,
    /// plus annotated tags on anything being sent when `include_tags`.
    fn select_objects(
        &self,
        adv: &Advertisement,
        wants: &[ObjectId],
        common: &[ObjectId],
        include_tags: bool,
    ) -> Result<Vec<ReachableObject>, ProtocolError> {
        let odb = self.repo.odb();
        let mut objects = grove_revwalk::list_objects(odb, wants, common)?;
        if !include_tags {
            return Ok(objects);
        }

        let mut sent: HashSet<ObjectId> = objects.iter().map(|o| o.oid).collect();
        for (name, id) in &adv.refs {
            let Some(peeled) = adv.peeled.get(name) else {
                continue;
            };
            if !sent.contains(peeled) || sent.contains(id) {
                continue;
            }
            let mut current = *id;
            while odb.header(&current)?.0 == ObjectKind::Tag && sent.insert(current) {
                objects.push(ReachableObject {
                    oid: current,
                    kind: ObjectKind::Tag,
                    path: None,
                });
                current = odb.tag(&current)?.target;
            }
        }
        Ok(objects)
    }

    /// Blob at each path of the common commits' trees, as delta bases.
    fn have_blobs(&self, common: &[ObjectId]) -> Result<HashMap<BString, ObjectId>, ProtocolError> {
        let odb = self.repo.odb();
        let mut blobs = HashMap::new();
        for id in common {
            let Ok((commit, ObjectKind::Commit)) = odb.peel(id) else {
                continue;
            };
            let root = odb.commit(&commit)?.tree;
            let mut stack = vec![(root, BString::default())];
            while let Some((tree, prefix)) = stack.pop() {
                for entry in odb.tree(&tree)?.entries {
                    let mut path = prefix.clone();
                    if !path.is_empty() {
                        path.push_byte(b'/');
                    }
                    path.push_str(&entry.name);
                    if entry.mode.is_tree() {
                        stack.push((entry.oid, path));
                    } else if entry.mode.is_blob() {
                        blobs.entry(path).or_insert(entry.oid);
                    }
                }
            }
        }
        Ok(blobs)
    }

    fn write_pack<W: Write>(
        &self,
        out: W,
        objects: &[ReachableObject],
        bases: &HashMap<BString, ObjectId>,
    ) -> Result<(W, usize), ProtocolError> {
        let odb = self.repo.odb();
        let mut writer = PackWriter::new(out, objects.len() as u32)?
            .with_compression(self.repo.core().pack_level());
        let mut thin = 0;
        for object in objects {
            let (kind, payload) = odb.get_raw(&object.oid)?;
            if let Some((base, delta)) = thin_delta(odb, object, &payload, bases)? {
                writer.add_ref_delta(object.oid, &base, &delta)?;
                thin += 1;
            } else {
                writer.add_object(kind, &payload)?;
            }
        }
        let (out, checksum, _) = writer.finish()?;
        tracing::debug!(%checksum, objects = objects.len(), thin, "wrote pack");
        Ok((out, thin))
    }
}

/// A delta for a blob against the client's blob at the same path, when it
/// is less than half the blob's size.
fn thin_delta(
    odb: &ObjectDatabase,
    object: &ReachableObject,
    payload: &[u8],
    bases: &HashMap<BString, ObjectId>,
) -> Result<Option<(ObjectId, Vec<u8>)>, ProtocolError> {
    if object.kind != ObjectKind::Blob {
        return Ok(None);
    }
    let Some(base) = object.path.as_ref().and_then(|p| bases.get(p)) else {
        return Ok(None);
    };
    if *base == object.oid {
        return Ok(None);
    }
    let source = odb.blob(base)?;
    let delta = delta::compute(&source, payload);
    if delta.len() < payload.len() / 2 {
        Ok(Some((*base, delta)))
    } else {
        Ok(None)
    }
}

/// Read the want section. `None` when the client hung up or wanted nothing.
fn read_wants(
    transport: &mut dyn Transport,
) -> Result<Option<(Vec<ObjectId>, Capabilities)>, ProtocolError> {
    let mut reader = PktLineReader::new(transport.reader());
    let mut wants = Vec::new();
    let mut requested = Capabilities::default();
    loop {
        let line = match reader.read_pkt() {
            Ok(PktLine::Data(line)) => line,
            Ok(_) => break,
            Err(ProtocolError::UnexpectedEof) if wants.is_empty() => return Ok(None),
            Err(e) => return Err(e),
        };
        let line = chomp(&line);
        let rest = line
            .strip_prefix(b"want ")
            .ok_or_else(|| ProtocolError::UnexpectedPacket(line.to_str_lossy().into_owned()))?;
        let (hex, caps) = match rest.split_once_str(" ") {
            Some((hex, caps)) => (hex, Some(caps)),
            None => (rest, None),
        };
        if wants.is_empty() {
            if let Some(caps) = caps {
                requested = Capabilities::parse(&caps.to_str_lossy());
            }
        }
        wants.push(ObjectId::from_hex(hex)?);
    }
    if wants.is_empty() {
        return Ok(None);
    }
    tracing::debug!(wants = wants.len(), capabilities = %requested, "read wants");
    Ok(Some((wants, requested)))
}
