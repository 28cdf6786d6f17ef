use log::{debug, info};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::credential::{self, Frame};
use crate::error::{Error, Result};

/// A camera, or anything else that can hand out frames one at a time
pub trait FrameSource {
    /// Whether the device was acquired successfully
    fn is_opened(&self) -> bool;

    /// Grab the next frame; an error here is fatal for the scan
    fn read(&mut self) -> Result<Frame>;

    /// Give the device back; called exactly once by [`Scanner`]
    fn release(&mut self);
}

/// Frames read from image files on disk, in order
///
/// Running out of files is reported like a camera that stopped delivering.
pub struct ImageFiles {
    paths: VecDeque<PathBuf>,
}

impl ImageFiles {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        ImageFiles {
            paths: paths.into_iter().collect(),
        }
    }
}

impl FrameSource for ImageFiles {
    fn is_opened(&self) -> bool {
        !self.paths.is_empty()
    }

    fn read(&mut self) -> Result<Frame> {
        let path = self
            .paths
            .pop_front()
            .ok_or_else(|| Error::capture("Failed to capture the frame."))?;
        Frame::open(&path)
            .map_err(|e| Error::capture(format!("Failed to capture the frame: {e}")))
    }

    fn release(&mut self) {
        self.paths.clear();
    }
}

/// Cooperative stop signal shared between a scan loop and whoever owns it
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a single decode attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    Decoded(String),
    Pending,
}

/// Reads frames from a source until one carries a QR payload
///
/// A scanner is single-use: once it has decoded a payload, hit a capture
/// error or been cancelled it is closed and the source released. Dropping
/// the scanner releases the source too.
pub struct Scanner<S: FrameSource> {
    source: S,
    closed: bool,
}

impl<S: FrameSource> Scanner<S> {
    /// Take ownership of a source, failing fast if it never opened
    pub fn open(mut source: S) -> Result<Self> {
        if !source.is_opened() {
            source.release();
            return Err(Error::capture("Could not access the camera."));
        }
        Ok(Scanner {
            source,
            closed: false,
        })
    }

    /// Grab one frame and make one decode attempt
    pub fn poll(&mut self) -> Result<Poll> {
        if self.closed {
            return Err(Error::capture("Scanner is closed."));
        }

        let frame = match self.source.read() {
            Ok(frame) => frame,
            Err(e) => {
                self.close();
                return Err(e);
            }
        };

        match credential::decode(&frame) {
            Some(payload) => {
                info!("decoded credential from {:?} frame", frame.dimensions());
                self.close();
                Ok(Poll::Decoded(payload))
            }
            None => {
                debug!("no QR code in {:?} frame", frame.dimensions());
                Ok(Poll::Pending)
            }
        }
    }

    /// Poll until a payload decodes, a capture error occurs or `cancel` fires
    ///
    /// Returns `Ok(None)` when cancelled.
    pub fn run(&mut self, cancel: &CancelToken) -> Result<Option<String>> {
        loop {
            if cancel.is_cancelled() {
                self.close();
                return Ok(None);
            }
            if let Poll::Decoded(payload) = self.poll()? {
                return Ok(Some(payload));
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.source.release();
        }
    }
}

impl<S: FrameSource> Drop for Scanner<S> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::cell::Cell;
    use std::rc::Rc;

    /// In-memory camera that counts how often it is released
    struct FakeCamera {
        opened: bool,
        frames: VecDeque<Result<Frame>>,
        releases: Rc<Cell<u32>>,
    }

    impl FakeCamera {
        fn new(frames: Vec<Result<Frame>>) -> (Self, Rc<Cell<u32>>) {
            let releases = Rc::new(Cell::new(0));
            let camera = FakeCamera {
                opened: true,
                frames: frames.into(),
                releases: releases.clone(),
            };
            (camera, releases)
        }
    }

    impl FrameSource for FakeCamera {
        fn is_opened(&self) -> bool {
            self.opened
        }

        fn read(&mut self) -> Result<Frame> {
            self.frames
                .pop_front()
                .unwrap_or_else(|| Err(Error::capture("Failed to capture the frame.")))
        }

        fn release(&mut self) {
            self.releases.set(self.releases.get() + 1);
        }
    }

    fn blank() -> Result<Frame> {
        Ok(Frame::from_gray(GrayImage::from_pixel(40, 40, Luma([255]))))
    }

    fn code(payload: &str) -> Result<Frame> {
        Frame::from_bytes(&credential::render_png(payload).unwrap())
    }

    #[test]
    fn closed_camera_fails_fast() {
        let (mut camera, releases) = FakeCamera::new(vec![]);
        camera.opened = false;

        let err = Scanner::open(camera).err().unwrap();
        assert!(matches!(err, Error::Capture(msg) if msg.contains("camera")));
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn run_returns_first_decoded_payload() {
        let (camera, releases) =
            FakeCamera::new(vec![blank(), blank(), code("alice@x.com"), code("bob@x.com")]);
        let mut scanner = Scanner::open(camera).unwrap();

        let payload = scanner.run(&CancelToken::new()).unwrap();
        assert_eq!(payload.as_deref(), Some("alice@x.com"));
        assert!(scanner.is_closed());
        assert_eq!(releases.get(), 1);

        // Non-restartable
        assert!(scanner.poll().is_err());
        drop(scanner);
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn capture_error_closes_the_scanner() {
        let (camera, releases) =
            FakeCamera::new(vec![blank(), Err(Error::capture("Failed to capture the frame."))]);
        let mut scanner = Scanner::open(camera).unwrap();

        assert_eq!(scanner.poll().unwrap(), Poll::Pending);
        assert!(matches!(scanner.poll(), Err(Error::Capture(_))));
        assert!(scanner.is_closed());
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn cancelled_run_releases_without_reading() {
        let (camera, releases) = FakeCamera::new(vec![code("alice@x.com")]);
        let mut scanner = Scanner::open(camera).unwrap();
        let cancel = CancelToken::new();
        cancel.clone().cancel();

        assert_eq!(scanner.run(&cancel).unwrap(), None);
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn dropping_an_open_scanner_releases_the_camera() {
        let (camera, releases) = FakeCamera::new(vec![blank()]);
        let scanner = Scanner::open(camera).unwrap();
        drop(scanner);
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn image_files_run_out_as_capture_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.png");
        GrayImage::from_pixel(40, 40, Luma([255])).save(&path).unwrap();

        let mut scanner = Scanner::open(ImageFiles::new(vec![path])).unwrap();
        let err = scanner.run(&CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::Capture(_)));
    }
}
