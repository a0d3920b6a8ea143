// Dashboard config store - Owns one dashboard's layouts, widget registry and widget configs
use crate::domain::dashboard::{DashboardConfig, DashboardError, DashboardExport, SavedDashboard, ValidationReport};
use crate::domain::layout::{find_optimal_position, optimize_layout, Breakpoint, Position};
use crate::domain::widget::{Widget, WidgetConfig, WidgetDefinition};
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const DEFAULT_DASHBOARD_NAME: &str = "My Dashboard";

pub fn new_widget_id() -> String {
    format!("widget-{}", Uuid::new_v4())
}

pub fn new_dashboard_id() -> String {
    format!("dash-{}", Uuid::new_v4())
}

/// Every mutation is applied immediately and visible to the next read.
#[derive(Debug, Clone)]
pub struct DashboardConfigStore {
    dashboard: DashboardConfig,
    active: Breakpoint,
}

impl Default for DashboardConfigStore {
    fn default() -> Self {
        Self::new(DashboardConfig::new(
            new_dashboard_id(),
            DEFAULT_DASHBOARD_NAME.to_string(),
        ))
    }
}

impl DashboardConfigStore {
    pub fn new(dashboard: DashboardConfig) -> Self {
        Self {
            dashboard,
            active: Breakpoint::Lg,
        }
    }

    pub fn dashboard(&self) -> &DashboardConfig {
        &self.dashboard
    }

    pub fn active_breakpoint(&self) -> Breakpoint {
        self.active
    }

    pub fn set_active_breakpoint(&mut self, breakpoint: Breakpoint) {
        self.active = breakpoint;
    }

    /// Registers a widget at the first free slot of the active layout.
    /// Never fails: without room it lands below everything else.
    pub fn add_widget(&mut self, widget_type: &str, definition: &WidgetDefinition) -> Position {
        let id = new_widget_id();
        let size = definition.default_size;
        let columns = self.active.columns();
        let layout = self.dashboard.layouts.entry(self.active).or_default();

        let slot = find_optimal_position(layout, columns, size.w, size.h);
        let position = Position {
            i: id.clone(),
            x: slot.x,
            y: slot.y,
            w: size.w,
            h: size.h,
            min_w: size.min_w,
            min_h: size.min_h,
        };
        layout.push(position.clone());

        self.dashboard.widgets.insert(
            id.clone(),
            Widget {
                widget_type: widget_type.to_string(),
                category: definition.category.clone(),
            },
        );
        if let Some(defaults) = &definition.default_config {
            self.dashboard.configs.insert(id.clone(), defaults.clone());
        }

        tracing::info!(
            widget_id = %id,
            widget_type,
            breakpoint = self.active.as_str(),
            x = slot.x,
            y = slot.y,
            "widget added"
        );
        position
    }

    /// Deletes the widget everywhere. The layout keeps its gaps; compaction
    /// is a separate, explicit step.
    pub fn remove_widget(&mut self, id: &str) -> Result<(), DashboardError> {
        if self.dashboard.widgets.shift_remove(id).is_none() {
            return Err(DashboardError::WidgetNotFound(id.to_string()));
        }
        self.dashboard.configs.shift_remove(id);
        for positions in self.dashboard.layouts.values_mut() {
            positions.retain(|p| p.i != id);
        }
        tracing::info!(widget_id = %id, "widget removed");
        Ok(())
    }

    pub fn update_widget_config(&mut self, id: &str, config: WidgetConfig) -> Result<(), DashboardError> {
        if !self.dashboard.widgets.contains_key(id) {
            return Err(DashboardError::WidgetNotFound(id.to_string()));
        }
        self.dashboard.configs.insert(id.to_string(), config);
        Ok(())
    }

    /// Vertical compaction of the active layout.
    pub fn optimize_layout(&mut self) -> &[Position] {
        let layout = self.dashboard.layouts.entry(self.active).or_default();
        *layout = optimize_layout(layout);
        layout
    }

    pub fn validate(&self) -> ValidationReport {
        self.dashboard.validate()
    }

    /// Storage snapshot. Refused as a whole when validation fails.
    pub fn to_saved(&self, now: DateTime<Utc>) -> Result<SavedDashboard, DashboardError> {
        let report = self.validate();
        if !report.is_valid {
            return Err(DashboardError::Validation(report.errors));
        }
        Ok(self.dashboard.to_saved(now))
    }

    /// Swaps in a stored dashboard. A corrupt one leaves the current state as is.
    pub fn load(&mut self, saved: SavedDashboard) -> Result<(), DashboardError> {
        let dashboard = DashboardConfig::from_saved(saved)?;
        tracing::info!(dashboard_id = %dashboard.id, "dashboard loaded");
        self.dashboard = dashboard;
        Ok(())
    }

    pub fn export_dashboard(&self, now: DateTime<Utc>) -> DashboardExport {
        self.dashboard.to_export(now)
    }

    /// Replaces the current dashboard with the imported one. On any error the
    /// current state is left exactly as it was.
    pub fn import_dashboard(&mut self, content: &str) -> Result<&DashboardConfig, DashboardError> {
        let imported = DashboardConfig::from_export_json(new_dashboard_id(), content)?;
        tracing::info!(dashboard_id = %imported.id, name = %imported.name, "dashboard imported");
        self.dashboard = imported;
        Ok(&self.dashboard)
    }

    /// Deep copy under a fresh id; the copy becomes the current dashboard.
    pub fn clone_dashboard(&mut self, new_name: Option<&str>) -> &DashboardConfig {
        let name = match new_name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{} (Copy)", self.dashboard.name),
        };
        let copy = DashboardConfig {
            id: new_dashboard_id(),
            name,
            ..self.dashboard.clone()
        };
        tracing::info!(source = %self.dashboard.id, dashboard_id = %copy.id, "dashboard cloned");
        self.dashboard = copy;
        &self.dashboard
    }
}
