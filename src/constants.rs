// Feature columns produced by the feature engine, in matrix order
pub const FEATURE_COLUMNS: [&str; 12] = [
    "Close",
    "Returns",
    "SMA20",
    "SMA50",
    "EMA20",
    "EMA50",
    "RSI",
    "ROC",
    "MACD",
    "BollingerBandWidth",
    "VolumeMA20",
    "VolumeRatio",
];

// Column holding the target value and the rollout slot
pub const CLOSE_COLUMN_INDEX: usize = 0;

// Indicator windows
pub const SMA_SHORT_WINDOW: usize = 20;
pub const SMA_LONG_WINDOW: usize = 50;
pub const RSI_WINDOW: usize = 14;
pub const ROC_PERIOD: usize = 10;
pub const MACD_FAST_SPAN: usize = 12;
pub const MACD_SLOW_SPAN: usize = 26;
pub const BOLLINGER_WINDOW: usize = 20;
pub const BOLLINGER_NUM_STD: f64 = 2.0;
pub const VOLUME_WINDOW: usize = 20;

// Model parameters
pub const DEFAULT_LOOKBACK: usize = 30; // Number of feature rows per window
pub const DEFAULT_HORIZON: usize = 30; // Days forecast per rollout

// Data preprocessing
pub const VALIDATION_SPLIT_RATIO: f64 = 0.2; // 20% of windows held out for validation
pub const MIN_TRAINING_WINDOWS: usize = 100; // Below this the result is flagged as limited data
pub const HARD_FLOOR_WINDOWS: usize = 2; // One training and one validation window at least

// Training
pub const EARLY_STOPPING_PATIENCE: usize = 15;
pub const DEFAULT_THRESHOLD_PCT: f64 = 5.0; // Tolerance for threshold accuracy
