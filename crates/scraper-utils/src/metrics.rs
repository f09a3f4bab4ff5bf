// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! A Prometheus registry wrapper and macros for declaring sets of metrics.

use std::{
    any::Any,
    collections::HashMap,
    sync::{Arc, Mutex},
};

use prometheus::{Encoder as _, TextEncoder, core::Collector, proto::MetricFamily};

/// Errors returned by [`Registry::get_or_register`].
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// A collector with the same ID was registered before, but it has a different type (e.g., a
    /// gauge and a counter with the same fully-qualified name).
    #[error("a collector with the same ID was already registered but with a different type")]
    InconsistentType,

    /// Some, but not all, of the collector's metrics are already registered by another
    /// collector.
    #[error("at least one metric in the collector has already been registered, ensure no overlaps")]
    MetricsOverlap,

    /// Any other error raised by [`prometheus::Registry::register`].
    ///
    /// This is never [`prometheus::Error::AlreadyReg`].
    #[error(transparent)]
    Prometheus(prometheus::Error),
}

/// A cloneable [`prometheus::Registry`] on which registering the same collector twice hands back
/// the collector that was registered first, instead of failing.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: prometheus::Registry,
    collectors_by_id: Arc<Mutex<HashMap<u64, Box<dyn Any + Send>>>>,
}

impl Registry {
    /// Registers `collector`, or returns the equal collector registered earlier.
    #[must_use = "the returned collector may differ from the one passed in"]
    pub fn get_or_register<T>(&self, collector: T) -> Result<T, RegistrationError>
    where
        T: Collector + Send + Clone + 'static,
    {
        let collector_id = Self::collector_id(&collector);

        match self.inner.register(Box::new(collector.clone())) {
            Ok(()) => {
                self.collectors_by_id
                    .lock()
                    .expect("the lock is never held across a panic")
                    .insert(collector_id, Box::new(collector.clone()));
                return Ok(collector);
            }
            Err(prometheus::Error::AlreadyReg) => (),
            Err(other) => return Err(RegistrationError::Prometheus(other)),
        }

        // `AlreadyReg` is returned as soon as one of the collector's metrics is known. The ID of
        // a collector combines the IDs of its metrics, so finding the ID means this exact
        // collector was registered before.
        let collectors_by_id = self
            .collectors_by_id
            .lock()
            .expect("the lock is never held across a panic");
        let existing = collectors_by_id
            .get(&collector_id)
            .ok_or(RegistrationError::MetricsOverlap)?;

        existing
            .downcast_ref::<T>()
            .cloned()
            .ok_or(RegistrationError::InconsistentType)
    }

    /// Mirrors how `prometheus::Registry::register` derives the ID of a collector.
    fn collector_id<T: Collector>(collector: &T) -> u64 {
        collector
            .desc()
            .into_iter()
            .fold(0u64, |id, desc| id.wrapping_add(desc.id))
    }

    /// Calls `prometheus::Registry::gather()`.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.inner.gather()
    }

    /// Renders all registered metrics in the Prometheus text exposition format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|error| prometheus::Error::Msg(error.to_string()))
    }

    /// The content type of [`Self::encode_text`]'s output.
    pub fn text_content_type() -> String {
        TextEncoder::new().format_type().to_owned()
    }
}

/// Defines a struct holding a set of prometheus metrics that are registered together.
///
/// # Example
///
/// ```ignore
/// scraper_utils::define_metric_set! {
///     #[namespace = "scraper"]
///     /// Docstring applied to the containing struct.
///     struct MyMetricSet {
///         #[help = "Help text and docstring for this metric"]
///         my_int_counter: IntCounter[],
///         #[help = "Vec-type metrics list their label names in the brackets"]
///         polls: IntCounterVec["status"],
///         #[help = "Histograms may specify their buckets"]
///         latency: Histogram{buckets: vec![0.25, 1.0, 10.0]},
///     }
/// }
/// ```
#[macro_export]
macro_rules! define_metric_set {
    (
        #[namespace = $namespace:literal]
        $(#[$outer:meta])*
        $vis:vis struct $name:ident {
            $(
                #[help = $help_str:literal]
                $field_name:ident: $field_type:ident $field_def:tt
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            $(
                #[doc = $help_str]
                pub $field_name: $field_type,
            )*
        }

        impl $name {
            /// The namespace in which the metrics reside.
            pub const NAMESPACE: &'static str = $namespace;

            /// Creates the metric set and registers it on `registry`.
            ///
            /// # Panics
            ///
            /// Panics if a metric of the set clashes with a differently-typed metric on the
            /// registry.
            pub fn new(registry: &$crate::metrics::Registry) -> Self {
                Self { $(
                    $field_name: {
                        let opts = ::prometheus::Opts::new(stringify!($field_name), $help_str)
                            .namespace($namespace);
                        let metric = $crate::create_metric!($field_type, opts, $field_def);
                        registry.get_or_register(metric)
                            .expect("metrics defined at compile time must be valid")
                    },
                )* }
            }
        }
    };
}

pub use define_metric_set;

/// Creates a single metric from its type, options, and either its labels or its buckets.
#[macro_export]
macro_rules! create_metric {
    ($field_type:ty, $opts:expr, []) => {{
        <$field_type>::with_opts($opts.into())
            .expect("this must be called with valid metrics type and options")
    }};
    (Histogram, $opts:expr, {buckets: $buckets:expr $(,)?}) => {{
        let mut opts: ::prometheus::HistogramOpts = $opts.into();
        opts.buckets = $buckets.into();

        ::prometheus::Histogram::with_opts(opts)
            .expect("this must be called with valid metrics type and options")
    }};
    ($field_type:ty, $opts:expr, $label_names:expr) => {{
        <$field_type>::new($opts.into(), &$label_names)
            .expect("this must be called with valid metrics type and options")
    }};
}

pub use create_metric;

/// Shorthand for `metric.with_label_values(&[...])`.
#[macro_export]
macro_rules! with_label {
    ($metric:expr, $($label:expr),+$(,)?) => {
        $metric.with_label_values(&[$($label.as_ref()),+])
    };
}
