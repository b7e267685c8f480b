/*
 *  session.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *	(c) 2020-26 Stuart Hunter
 *
 *	Owns the display for the life of a run and leaves it dark on the way out
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::display::{BoxedTransport, DisplayError, VfdDisplay};

/// An open, initialised display plus the stop flag every loop watches.
///
/// Dropping the session clears the display RAM and closes the transport,
/// whatever path the run took to get there.
pub struct Session {
    display: VfdDisplay,
    stop: Arc<AtomicBool>,
}

impl Session {
    /// Open the transport, run the power-up sequence and blank the panel
    pub fn start(transport: BoxedTransport) -> Result<Self, DisplayError> {
        let display = VfdDisplay::new(transport);
        display.open()?;
        // from here on Drop does the cleanup
        let session = Self { display, stop: Arc::new(AtomicBool::new(false)) };
        session.display.init()?;
        session.display.clear()?;
        info!("display session started");
        Ok(session)
    }

    pub fn display(&self) -> &VfdDisplay {
        &self.display
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if !self.display.is_open() {
            return;
        }
        if let Err(e) = self.display.clear() {
            warn!("clear on shutdown failed: {}", e);
        }
        self.display.close();
        debug!("display session closed");
    }
}
