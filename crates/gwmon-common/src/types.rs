use crate::proto::{Gauge, LabelPair, Metric, MetricFamily, MetricName, MetricType};

impl LabelPair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Metric {
    /// Appends a label pair. Existing labels with the same name are kept.
    pub fn add_label(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.label.push(LabelPair::new(name, value));
    }

    /// Returns the value of the last label named `name`, if any.
    pub fn label_value(&self, name: &str) -> Option<&str> {
        self.label
            .iter()
            .rev()
            .find(|l| l.name == name)
            .map(|l| l.value.as_str())
    }

    pub fn gauge_value(&self) -> Option<f64> {
        self.gauge.as_ref().map(|g| g.value)
    }
}

impl MetricFamily {
    /// Builds a gauge family holding exactly one sample.
    ///
    /// # Examples
    ///
    /// ```
    /// use gwmon_common::proto::{MetricFamily, MetricType};
    ///
    /// let family = MetricFamily::single_gauge("up", 1.0, 1_700_000_000_000, &[("service", "mme")]);
    /// assert_eq!(family.r#type(), MetricType::Gauge);
    /// assert_eq!(family.metric.len(), 1);
    /// assert_eq!(family.metric[0].gauge_value(), Some(1.0));
    /// assert_eq!(family.metric[0].label_value("service"), Some("mme"));
    /// ```
    pub fn single_gauge(
        name: impl Into<String>,
        value: f64,
        timestamp_ms: i64,
        labels: &[(&str, &str)],
    ) -> Self {
        let mut metric = Metric {
            gauge: Some(Gauge { value }),
            timestamp_ms,
            ..Default::default()
        };
        for (k, v) in labels {
            metric.add_label(*k, *v);
        }
        let mut family = MetricFamily {
            name: name.into(),
            metric: vec![metric],
            ..Default::default()
        };
        family.set_type(MetricType::Gauge);
        family
    }

    /// Appends `name=value` to every sample in the family.
    pub fn label_all(&mut self, name: &str, value: &str) {
        for metric in &mut self.metric {
            metric.add_label(name, value);
        }
    }
}

impl MetricName {
    /// Returns true when `family_name` denotes this series, either by its
    /// symbolic name or by its decimal enum code.
    ///
    /// # Examples
    ///
    /// ```
    /// use gwmon_common::proto::MetricName;
    ///
    /// let start = MetricName::ProcessStartTimeSeconds;
    /// assert!(start.matches("process_start_time_seconds"));
    /// assert!(start.matches(&(start as i32).to_string()));
    /// assert!(!start.matches("process_uptime_seconds"));
    /// ```
    pub fn matches(self, family_name: &str) -> bool {
        if family_name == self.as_str_name() {
            return true;
        }
        family_name
            .parse::<i32>()
            .is_ok_and(|code| code == self as i32)
    }
}
