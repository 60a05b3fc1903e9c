//! Audio subsystem for soundstage
//!
//! This crate renders decoded mono streams into interleaved stereo using
//! the gain and pan the engine publishes for each entity.

use log::{debug, info, trace, warn};
use stage::{MixSink, MixSnapshot};
use stage_core::{AudioBuffer, EntityId, OUTPUT_CHANNELS, SAMPLE_RATE};
use std::collections::HashMap;
use std::f32::consts::FRAC_PI_4;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Mono frames in one 10 ms block
pub const BLOCK_FRAMES: usize = (SAMPLE_RATE / 100) as usize;

/// Left and right weights for `pan` in [-1, 1], constant power.
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * FRAC_PI_4;
    (angle.cos(), angle.sin())
}

/// Mix `frames` samples of each source into an interleaved stereo buffer.
///
/// Sources the snapshot does not list are skipped. The result is divided by
/// the number of contributing sources so it cannot clip.
pub fn render(
    snapshot: &MixSnapshot,
    sources: &HashMap<EntityId, AudioBuffer>,
    frames: usize,
) -> AudioBuffer {
    let channels = OUTPUT_CHANNELS as usize;
    let mut mixed = vec![0.0; frames * channels];

    let mut contributing = 0usize;
    for (id, buffer) in sources {
        let Some(pair) = snapshot.params.get(id) else {
            trace!("Skipping {}: not received", id);
            continue;
        };
        contributing += 1;

        let (left, right) = pan_gains(pair.pan);
        let len = frames.min(buffer.len());
        for (i, sample) in buffer[..len].iter().enumerate() {
            mixed[i * channels] += sample * pair.gain * left;
            mixed[i * channels + 1] += sample * pair.gain * right;
        }
    }

    if contributing > 1 {
        let scale = contributing as f32;
        for sample in mixed.iter_mut() {
            *sample /= scale;
        }
    }

    mixed
}

/// Renderer that keeps the most recent snapshot handed to it
#[derive(Debug, Default)]
pub struct SpatialMixer {
    snapshot: Arc<MixSnapshot>,
}

impl SpatialMixer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u64 {
        self.snapshot.revision
    }

    pub fn render(&self, sources: &HashMap<EntityId, AudioBuffer>, frames: usize) -> AudioBuffer {
        render(&self.snapshot, sources, frames)
    }
}

impl MixSink for SpatialMixer {
    fn apply(&mut self, snapshot: &MixSnapshot) {
        debug!(
            "Mixer moved to r{} ({} streams)",
            snapshot.revision,
            snapshot.len()
        );
        self.snapshot = Arc::new(snapshot.clone());
    }
}

/// Background task that re-renders whenever a source delivers audio.
pub struct MixerTask {
    snapshots: watch::Receiver<Arc<MixSnapshot>>,
    source_rx: mpsc::Receiver<(EntityId, AudioBuffer)>,
    output_tx: mpsc::Sender<AudioBuffer>,
    frames: usize,
}

impl MixerTask {
    pub fn new(
        snapshots: watch::Receiver<Arc<MixSnapshot>>,
        source_rx: mpsc::Receiver<(EntityId, AudioBuffer)>,
        output_tx: mpsc::Sender<AudioBuffer>,
        frames: usize,
    ) -> Self {
        Self {
            snapshots,
            source_rx,
            output_tx,
            frames,
        }
    }

    /// Run until the sources close or the output is dropped.
    pub async fn run(mut self) {
        info!("Starting spatial mixing task");
        let mut mixer = SpatialMixer::new();
        let mut latest: HashMap<EntityId, AudioBuffer> = HashMap::new();
        let initial = self.snapshots.borrow_and_update().clone();
        mixer.apply(&initial);

        loop {
            tokio::select! {
                changed = self.snapshots.changed() => {
                    if changed.is_err() {
                        debug!("Snapshot publisher dropped");
                        break;
                    }
                    let snapshot = self.snapshots.borrow_and_update().clone();
                    // Streams that stopped being received are forgotten
                    latest.retain(|id, _| snapshot.params.contains_key(id));
                    mixer.apply(&snapshot);
                }

                Some((id, buffer)) = self.source_rx.recv() => {
                    latest.insert(id, buffer);
                    let mixed = mixer.render(&latest, self.frames);
                    if self.output_tx.send(mixed).await.is_err() {
                        warn!("Playback receiver dropped, stopping mixer");
                        break;
                    }
                }

                else => break,
            }
        }
        info!("Spatial mixing task ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stage::{PairParams, SnapshotFlags};
    use stage_core::Connection;
    use std::collections::BTreeMap;

    fn pair(gain: f32, pan: f32) -> PairParams {
        PairParams {
            gain,
            distance: 1.0,
            azimuth: 0.0,
            elevation: 0.0,
            pan,
            coefficient: 0.5,
            zone: None,
            teammate: false,
        }
    }

    fn snapshot(entries: &[(EntityId, PairParams)]) -> MixSnapshot {
        MixSnapshot {
            connection: Connection::default(),
            revision: 1,
            flags: SnapshotFlags::default(),
            params: entries.iter().cloned().collect::<BTreeMap<_, _>>(),
        }
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn pan_law() {
        let (l, r) = pan_gains(0.0);
        assert!(approx(l, r));
        assert!(approx(l * l + r * r, 1.0));

        let (l, r) = pan_gains(1.0);
        assert!(approx(l, 0.0));
        assert!(approx(r, 1.0));

        let (l, r) = pan_gains(-1.0);
        assert!(approx(l, 1.0));
        assert!(approx(r, 0.0));
    }

    #[test]
    fn render_applies_gain_and_pan() {
        let snap = snapshot(&[(EntityId::User(1), pair(0.5, 1.0))]);
        let mut sources = HashMap::new();
        sources.insert(EntityId::User(1), vec![1.0, 1.0]);

        let out = render(&snap, &sources, 2);
        assert_eq!(out.len(), 4);
        assert!(approx(out[0], 0.0));
        assert!(approx(out[1], 0.5));
        assert!(approx(out[3], 0.5));
    }

    #[test]
    fn unlisted_sources_are_silent() {
        let snap = snapshot(&[(EntityId::User(1), pair(1.0, -1.0))]);
        let mut sources = HashMap::new();
        sources.insert(EntityId::User(1), vec![0.4; 4]);
        sources.insert(EntityId::User(2), vec![1.0; 4]);

        // Only one source contributes, so nothing is rescaled
        let out = render(&snap, &sources, 4);
        for frame in out.chunks(2) {
            assert!(approx(frame[0], 0.4));
            assert!(approx(frame[1], 0.0));
        }
    }

    #[test]
    fn several_sources_are_normalized() {
        let snap = snapshot(&[
            (EntityId::User(1), pair(1.0, -1.0)),
            (EntityId::Player(3), pair(1.0, -1.0)),
        ]);
        let mut sources = HashMap::new();
        sources.insert(EntityId::User(1), vec![0.5; 4]);
        sources.insert(EntityId::Player(3), vec![0.3; 4]);

        let out = render(&snap, &sources, 4);
        for frame in out.chunks(2) {
            assert!(approx(frame[0], 0.4));
        }
    }

    #[test]
    fn short_buffers_are_padded() {
        let snap = snapshot(&[(EntityId::User(1), pair(1.0, -1.0))]);
        let mut sources = HashMap::new();
        sources.insert(EntityId::User(1), vec![1.0]);

        let out = render(&snap, &sources, 3);
        assert_eq!(out.len(), 6);
        assert!(approx(out[0], 1.0));
        assert!(approx(out[2], 0.0));
        assert!(approx(out[4], 0.0));
    }

    #[test]
    fn empty_mix_is_silent_block() {
        let out = render(&MixSnapshot::default(), &HashMap::new(), BLOCK_FRAMES);
        assert_eq!(out.len(), 960);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn mixer_tracks_applied_snapshot() {
        let mut mixer = SpatialMixer::new();
        assert_eq!(mixer.revision(), 0);

        let mut snap = snapshot(&[(EntityId::User(1), pair(1.0, 0.0))]);
        snap.revision = 7;
        mixer.apply(&snap);
        assert_eq!(mixer.revision(), 7);

        let mut sources = HashMap::new();
        sources.insert(EntityId::User(1), vec![1.0]);
        let out = mixer.render(&sources, 1);
        assert!(approx(out[0], FRAC_PI_4.cos()));
    }

    #[test]
    fn mixer_task_stops_when_playback_is_dropped() {
        let snap = snapshot(&[(EntityId::User(1), pair(1.0, 0.0))]);
        let (_snapshot_tx, snapshot_rx) = watch::channel(Arc::new(snap));
        let (source_tx, source_rx) = mpsc::channel(1);
        let (output_tx, output_rx) = mpsc::channel(1);
        drop(output_rx);

        tokio_test::block_on(async {
            source_tx.send((EntityId::User(1), vec![1.0])).await.unwrap();
            // Returns after the first render fails to reach playback
            MixerTask::new(snapshot_rx, source_rx, output_tx, 1).run().await;
        });
    }

    #[test_log::test(tokio::test)]
    async fn mixer_task_renders_sources() {
        let snap = snapshot(&[(EntityId::User(1), pair(1.0, -1.0))]);
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(snap));
        let (source_tx, source_rx) = mpsc::channel(4);
        let (output_tx, mut output_rx) = mpsc::channel(4);

        let task = tokio::spawn(MixerTask::new(snapshot_rx, source_rx, output_tx, 2).run());

        source_tx
            .send((EntityId::User(1), vec![0.5, 0.25]))
            .await
            .unwrap();
        let out = output_rx.recv().await.unwrap();
        assert_eq!(out.len(), 4);
        assert!(approx(out[0], 0.5));
        assert!(approx(out[1], 0.0));
        assert!(approx(out[2], 0.25));

        drop(source_tx);
        drop(snapshot_tx);
        task.await.unwrap();
    }
}
