use core::fmt;

bitflags::bitflags! {
    /// Deficiencies of a rendered frame.
    ///
    /// Rendering a frame never fails outright; instead, anything that went wrong is
    /// recorded here (and logged) and the frame is shown as well as it could be made.
    ///
    /// It is a [`bitflags`] generated bit-flag type. *Note: We make no guarantees that
    /// the numeric value of flags will stay the same across versions*; please treat this
    /// as a set of named values only.
    ///
    /// The [empty](Self::empty) set means no flaws are present.
    #[derive(Clone, Copy, Debug, Hash, Eq, Ord, PartialEq, PartialOrd)]
    pub struct Flaws: u16 {
        /// Ray casting was aborted before every row was cast.
        const UNFINISHED = 1 << 0;

        /// The rendering has a flaw not otherwise classified.
        const OTHER = 1 << 1;

        /// The camera's projection matrix did not have the expected form, so depths read
        /// back from the depth buffer may be wrong, and with them the occlusion between
        /// volumes and previously drawn content.
        const DEPTH_SUSPECT = 1 << 2;

        /// The working image could not be rescaled to the window, so nothing was written.
        const NOT_PRESENTED = 1 << 3;

        /// A software-buffer volume produced an image of the wrong size and was left out.
        const SOFTWARE_BUFFER_MISMATCH = 1 << 4;

        /// Ray-cast volumes were visible, but there was no usable camera to cast rays from.
        const NO_CAMERA = 1 << 5;
    }
}

impl Default for Flaws {
    /// Equivalent to [`Self::empty()`].
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Flaws {
    /// Displays the flags as text like “`UNFINISHED | NOT_PRESENTED`".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
