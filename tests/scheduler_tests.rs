use std::io::Write;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::timeout;

use annotator::error::{Error, Result};
use annotator::kernel::event::{CursorMotion, CursorUpdate, PlaybackNotice, RecordedMessage, Topic};
use annotator::kernel::scheduler::{playback_channels, PlaybackScheduler, PlaybackState, SeekTarget};
use annotator::kernel::source::{EventSource, MemorySource, MessageIter, RecordingFile};
use annotator::kernel::time::{ClockTranslator, Timestamp};

const WAIT: Duration = Duration::from_secs(5);

fn ts(secs: f64) -> Timestamp {
    Timestamp::from_secs(secs)
}

fn frames(topic: Topic, times: &[f64]) -> Vec<RecordedMessage> {
    times
        .iter()
        .map(|t| RecordedMessage { topic, time: ts(*t), data: vec![1, 2, 3] })
        .collect()
}

async fn next_cursor(rx: &mut mpsc::Receiver<CursorUpdate>) -> CursorUpdate {
    timeout(WAIT, rx.recv())
        .await
        .expect("cursor update timed out")
        .expect("cursor channel closed")
}

async fn wait_for_notice(rx: &mut mpsc::Receiver<PlaybackNotice>, wanted: PlaybackNotice) {
    loop {
        let notice = timeout(WAIT, rx.recv())
            .await
            .expect("notice timed out")
            .expect("notice channel closed");
        if notice == wanted {
            return;
        }
    }
}

#[test]
fn test_pause_shifts_delivery_by_pause_length() {
    let wall = Instant::now();
    let mut translator = ClockTranslator::new(ts(50.0), wall);

    let before = translator.translate(ts(51.0));
    translator.shift(Duration::from_secs(3));
    let after = translator.translate(ts(51.0));

    assert_eq!(after, before + Duration::from_secs(3));
    assert_eq!(translator.origin_recorded(), ts(50.0));
}

#[test]
fn test_translator_reorigin_and_past_events() {
    let wall = Instant::now();
    let mut translator = ClockTranslator::new(ts(10.0), wall);

    // Events before the origin are due immediately.
    assert_eq!(translator.translate(ts(9.0)), wall);

    let later = wall + Duration::from_secs(7);
    translator.reorigin(ts(100.0), later);
    assert_eq!(translator.translate(ts(100.0)), later);
    assert_eq!(translator.translate(ts(102.0)), later + Duration::from_secs(2));
}

#[test]
fn test_seek_targets_are_clamped() {
    let (outputs, _receivers) = playback_channels(8);
    let mut scheduler = PlaybackScheduler::new(outputs);
    let source = MemorySource::new(frames(Topic::EnvCamera, &[20000.0, 20100.0]));
    assert_eq!(scheduler.load(Box::new(source)).unwrap(), (ts(20000.0), ts(20100.0)));

    let handle = scheduler.handle();
    assert_eq!(handle.state(), PlaybackState::Loaded);
    assert_eq!(handle.seek(SeekTarget::To(20050)), Some(ts(20050.0)));
    assert_eq!(handle.seek(SeekTarget::By(-30)), Some(ts(20020.0)));
    assert_eq!(handle.seek(SeekTarget::By(-3000)), Some(ts(20000.0)));
    assert_eq!(handle.seek(SeekTarget::To(50)), Some(ts(20050.0)));
    assert_eq!(handle.seek(SeekTarget::To(-1)), Some(ts(20100.0)));
    assert_eq!(handle.seek(SeekTarget::To(99999)), Some(ts(20100.0)));
    assert_eq!(handle.seek(SeekTarget::At(ts(20001.5))), Some(ts(20001.5)));
    assert_eq!(handle.cursor(), ts(20001.5));
}

#[test]
fn test_start_without_recording_fails() {
    let (outputs, _receivers) = playback_channels(8);
    let mut scheduler = PlaybackScheduler::new(outputs);
    assert!(matches!(scheduler.start(), Err(Error::NotLoaded)));
}

#[tokio::test]
async fn test_playback_delivers_in_order() {
    let (outputs, mut receivers) = playback_channels(16);
    let mut scheduler = PlaybackScheduler::new(outputs);
    let source = MemorySource::new(frames(Topic::CameraPurple, &[10.0, 10.1, 10.2, 10.3, 10.4]));
    scheduler.load(Box::new(source)).unwrap();
    let handle = scheduler.handle();
    let playback = scheduler.spawn().unwrap();

    let first = next_cursor(&mut receivers.cursor).await;
    assert_eq!(first.motion, CursorMotion::Jump);
    assert_eq!(first.time, ts(10.0));

    let mut times = Vec::new();
    for _ in 0..5 {
        let update = next_cursor(&mut receivers.cursor).await;
        assert_eq!(update.motion, CursorMotion::Advance);
        times.push(update.time.secs);
    }
    assert_eq!(times, vec![10.0, 10.1, 10.2, 10.3, 10.4]);
    assert!((handle.cursor().since(ts(10.0)) - 0.4).abs() < 1e-9);

    wait_for_notice(&mut receivers.notices, PlaybackNotice::Finished).await;
    handle.stop();
    wait_for_notice(&mut receivers.notices, PlaybackNotice::Stopped).await;

    let summary = playback.join().unwrap().unwrap();
    assert_eq!(summary.delivered, 5);
    assert_eq!(summary.skipped, 0);
    assert_eq!(handle.state(), PlaybackState::Stopped);

    let purple = receivers.payloads.get_mut(&Topic::CameraPurple).unwrap();
    let mut payloads = 0;
    while purple.try_recv().is_ok() {
        payloads += 1;
    }
    assert_eq!(payloads, 5);
}

#[tokio::test]
async fn test_pause_delays_next_event() {
    let (outputs, mut receivers) = playback_channels(16);
    let mut scheduler = PlaybackScheduler::new(outputs);
    scheduler
        .load(Box::new(MemorySource::new(frames(Topic::AudioPurple, &[1.0, 1.3]))))
        .unwrap();
    let handle = scheduler.handle();
    let playback = scheduler.spawn().unwrap();

    next_cursor(&mut receivers.cursor).await; // jump to begin
    next_cursor(&mut receivers.cursor).await; // first frame
    let delivered_first = Instant::now();

    assert!(handle.pause());
    assert!(handle.is_paused());
    wait_for_notice(&mut receivers.notices, PlaybackNotice::Paused).await;
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(handle.resume());

    let second = next_cursor(&mut receivers.cursor).await;
    assert_eq!(second.time, ts(1.3));
    assert!(
        delivered_first.elapsed() >= Duration::from_millis(650),
        "pause must push delivery back, got {:?}",
        delivered_first.elapsed()
    );

    handle.stop();
    playback.join().unwrap().unwrap();
}

#[tokio::test]
async fn test_seek_while_paused_publishes_jump() {
    let (outputs, mut receivers) = playback_channels(64);
    let mut scheduler = PlaybackScheduler::new(outputs);
    let times: Vec<f64> = (0..20).map(|i| 10.0 + i as f64 * 0.5).collect();
    scheduler
        .load(Box::new(MemorySource::new(frames(Topic::CameraYellow, &times))))
        .unwrap();
    let handle = scheduler.handle();
    let playback = scheduler.spawn().unwrap();

    next_cursor(&mut receivers.cursor).await;
    next_cursor(&mut receivers.cursor).await;
    handle.pause();
    wait_for_notice(&mut receivers.notices, PlaybackNotice::Paused).await;

    assert_eq!(handle.seek(SeekTarget::To(5)), Some(ts(15.0)));
    assert_eq!(handle.cursor(), ts(15.0));

    let jump = next_cursor(&mut receivers.cursor).await;
    assert_eq!(jump.motion, CursorMotion::Jump);
    assert_eq!(jump.time, ts(15.0));
    assert!((jump.elapsed - 5.0).abs() < 1e-9);
    assert!(handle.is_paused(), "seek must not resume playback");

    handle.stop();
    let summary = playback.join().unwrap().unwrap();
    assert_eq!(summary.delivered, 1);

    // Requests after stop are ignored.
    assert!(!handle.pause());
    assert!(!handle.resume());
    assert_eq!(handle.seek(SeekTarget::By(1)), None);
}

#[tokio::test]
async fn test_seek_restarts_from_new_begin() {
    let (outputs, mut receivers) = playback_channels(64);
    let mut scheduler = PlaybackScheduler::new(outputs);
    scheduler
        .load(Box::new(MemorySource::new(frames(Topic::EnvCamera, &[0.0, 0.1, 30.0, 30.1]))))
        .unwrap();
    let handle = scheduler.handle();
    let playback = scheduler.spawn().unwrap();

    next_cursor(&mut receivers.cursor).await;
    next_cursor(&mut receivers.cursor).await;
    next_cursor(&mut receivers.cursor).await;

    // Now waiting thirty seconds for the next frame; the seek cuts that short.
    handle.seek(SeekTarget::At(ts(30.0)));
    let jump = next_cursor(&mut receivers.cursor).await;
    assert_eq!((jump.motion, jump.time), (CursorMotion::Jump, ts(30.0)));

    let a = next_cursor(&mut receivers.cursor).await;
    let b = next_cursor(&mut receivers.cursor).await;
    assert_eq!((a.time, b.time), (ts(30.0), ts(30.1)));

    handle.stop();
    let summary = playback.join().unwrap().unwrap();
    assert_eq!(summary.restarts, 1);
    assert_eq!(summary.delivered, 4);
}

/// Source whose `None` entries fail to decode.
struct FlakySource {
    entries: Vec<Option<RecordedMessage>>,
}

impl EventSource for FlakySource {
    fn bounds(&self) -> (Timestamp, Timestamp) {
        (ts(0.0), ts(0.2))
    }

    fn read_range(&mut self, _begin: Timestamp, _end: Timestamp) -> Result<MessageIter<'_>> {
        Ok(Box::new(self.entries.iter().map(|entry| match entry {
            Some(message) => Ok(message.clone()),
            None => Err(Error::Decode("corrupt frame".to_string())),
        })))
    }
}

#[tokio::test]
async fn test_decode_failure_is_skipped() {
    let (outputs, mut receivers) = playback_channels(16);
    let mut scheduler = PlaybackScheduler::new(outputs);
    let mut good = frames(Topic::SandtrayBackground, &[0.0, 0.2]).into_iter();
    let source = FlakySource {
        entries: vec![good.next(), None, good.next()],
    };
    scheduler.load(Box::new(source)).unwrap();
    let handle = scheduler.handle();
    let playback = scheduler.spawn().unwrap();

    wait_for_notice(&mut receivers.notices, PlaybackNotice::Finished).await;
    handle.stop();
    let summary = playback.join().unwrap().unwrap();
    assert_eq!(summary.delivered, 2);
    assert_eq!(summary.skipped, 1);
}

#[test]
fn test_recording_file_bounds_and_topics() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"topic": "camera_purple", "time": 5.0, "data": [1, 2]}}"#).unwrap();
    writeln!(file, r#"{{"topic": "unknown_topic", "time": 1.0}}"#).unwrap();
    writeln!(file, "not json").unwrap();
    writeln!(file).unwrap();
    writeln!(file, r#"{{"topic": "audio_purple", "time": 7.5}}"#).unwrap();
    file.flush().unwrap();

    let mut recording = RecordingFile::open(file.path()).unwrap();
    assert_eq!(recording.bounds(), (ts(5.0), ts(7.5)));

    let items: Vec<_> = recording.read_range(ts(0.0), ts(10.0)).unwrap().collect();
    assert_eq!(items.len(), 3);
    assert!(items[1].is_err(), "bad line surfaces as a decode error");
    let first = items[0].as_ref().unwrap();
    assert_eq!((first.topic, first.data.clone()), (Topic::CameraPurple, vec![1, 2]));

    let tail: Vec<_> = recording
        .read_range(ts(6.0), ts(10.0))
        .unwrap()
        .filter_map(|item| item.ok())
        .collect();
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].topic, Topic::AudioPurple);
}

#[test]
fn test_recording_file_failures() {
    assert!(matches!(
        RecordingFile::open("/nonexistent/recording.jsonl"),
        Err(Error::Io(_))
    ));

    let mut empty = tempfile::NamedTempFile::new().unwrap();
    writeln!(empty, r#"{{"topic": "elsewhere", "time": 1.0}}"#).unwrap();
    empty.flush().unwrap();
    assert!(matches!(
        RecordingFile::open(empty.path()),
        Err(Error::EmptyRecording(_))
    ));
}

#[test]
fn test_translator_caps_far_future_offsets() {
    let wall = Instant::now();
    let mut translator = ClockTranslator::new(ts(0.0), wall);

    let near = translator.translate(ts(1.0e6));
    let far = translator.translate(ts(1.0e20));
    assert_eq!(near, wall + Duration::from_secs(1_000_000));
    assert!(far >= near);
    assert_eq!(translator.translate(ts(f64::MAX)), far);

    translator.shift(Duration::from_secs(10));
    assert!(translator.translate(ts(1.0e20)) >= wall);
}

#[tokio::test]
async fn test_out_of_range_timestamp_is_skipped() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"topic": "env_camera", "time": 0.0}}"#).unwrap();
    writeln!(file, r#"{{"topic": "env_camera", "time": 1e20}}"#).unwrap();
    writeln!(file, r#"{{"topic": "env_camera", "time": 0.1}}"#).unwrap();
    file.flush().unwrap();

    let (outputs, mut receivers) = playback_channels(16);
    let mut scheduler = PlaybackScheduler::new(outputs);
    assert_eq!(scheduler.load_file(file.path()).unwrap(), (ts(0.0), ts(0.1)));
    let handle = scheduler.handle();
    let playback = scheduler.spawn().unwrap();

    wait_for_notice(&mut receivers.notices, PlaybackNotice::Finished).await;
    handle.stop();
    wait_for_notice(&mut receivers.notices, PlaybackNotice::Stopped).await;

    let summary = playback.join().unwrap().unwrap();
    assert_eq!(summary.delivered, 2);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn test_pause_and_resume_after_finished_are_announced() {
    let (outputs, mut receivers) = playback_channels(16);
    let mut scheduler = PlaybackScheduler::new(outputs);
    scheduler
        .load(Box::new(MemorySource::new(frames(Topic::CameraPurple, &[3.0]))))
        .unwrap();
    let handle = scheduler.handle();
    let playback = scheduler.spawn().unwrap();

    wait_for_notice(&mut receivers.notices, PlaybackNotice::Finished).await;

    assert!(handle.pause());
    wait_for_notice(&mut receivers.notices, PlaybackNotice::Paused).await;
    assert_eq!(handle.state(), PlaybackState::Paused);

    // A second pause is not a transition.
    assert!(handle.pause());
    assert!(handle.resume());
    wait_for_notice(&mut receivers.notices, PlaybackNotice::Resumed).await;
    assert_eq!(handle.state(), PlaybackState::Playing);
    assert!(receivers.notices.try_recv().is_err());

    handle.stop();
    wait_for_notice(&mut receivers.notices, PlaybackNotice::Stopped).await;
    assert_eq!(playback.join().unwrap().unwrap().delivered, 1);
}

#[test]
fn test_reload_after_stop_plays_again() {
    let (outputs, mut receivers) = playback_channels(16);
    let mut scheduler = PlaybackScheduler::new(outputs);
    let handle = scheduler.handle();

    scheduler
        .load(Box::new(MemorySource::new(frames(Topic::EnvCamera, &[0.0]))))
        .unwrap();
    handle.pause();
    handle.stop();
    assert_eq!(scheduler.start().unwrap().delivered, 0);
    assert_eq!(handle.state(), PlaybackState::Stopped);

    scheduler
        .load(Box::new(MemorySource::new(frames(Topic::EnvCamera, &[0.0, 0.1]))))
        .unwrap();
    assert_eq!(handle.state(), PlaybackState::Loaded);
    assert!(!handle.is_paused());

    let summary = std::thread::scope(|scope| {
        let playback = scope.spawn(|| scheduler.start());
        while let Some(notice) = receivers.notices.blocking_recv() {
            if notice == PlaybackNotice::Finished {
                break;
            }
        }
        handle.stop();
        playback.join().unwrap()
    });
    assert_eq!(summary.unwrap().delivered, 2);
}

#[test]
fn test_recording_file_skips_non_utf8_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.jsonl");
    let mut bytes = br#"{"topic": "camera_yellow", "time": 2.0}"#.to_vec();
    bytes.extend_from_slice(b"\n{\"topic\": \"\xff\xfe\", \"time\": 3.0}\n");
    bytes.extend_from_slice(br#"{"topic": "camera_yellow", "time": 4.0}"#);
    bytes.push(b'\n');
    std::fs::write(&path, bytes).unwrap();

    let mut recording = RecordingFile::open(&path).unwrap();
    assert_eq!(recording.bounds(), (ts(2.0), ts(4.0)));

    let items: Vec<_> = recording.read_range(ts(0.0), ts(10.0)).unwrap().collect();
    assert_eq!(items.len(), 3);
    assert!(matches!(items[1], Err(Error::Decode(_))));
    assert_eq!(items[2].as_ref().unwrap().time, ts(4.0));
}
