use fugit::MillisDurationU32;

/// The number of samples each frame buffer slot can hold.
pub const BUFFER_SIZE: usize = 1024;

/// The number of analog channels sampled on every tick. This also defines the interleaving of
/// samples within a frame.
pub const CHANNEL_COUNT: usize = 3;

/// The targeted wall-clock interval between two frames. The frame size is derived from this
/// period and the sampling frequency, so frames are emitted by sample count, not by time.
pub const SEND_PERIOD: MillisDurationU32 = MillisDurationU32::from_ticks(200);

/// The serial link baud rate. Must match the host.
pub const BAUD_RATE: u32 = 115_200;

/// The resolution of the on-chip ADC conversions.
pub const ADC_RESOLUTION_BITS: u32 = 12;

/// The depth of the queue handing received host commands to the deferred handler.
pub const EVENT_QUEUE_DEPTH: usize = 4;

/// The depth of the queue handing reply lines to the main loop.
pub const REPLY_QUEUE_DEPTH: usize = 4;

/// The toggle period of the error indicator while halted on a fatal configuration error.
pub const ERROR_BLINK_PERIOD: MillisDurationU32 = MillisDurationU32::from_ticks(250);

/// The constant carried on channels beyond the timestamp pair by the diagnostic counter source.
pub const CHECK_VALUE: u16 = 3000;
