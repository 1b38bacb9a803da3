//! Areas, permission flags and roles.
//!
//! A role is a named set of [`Permission`] flags. When an actor authenticates
//! their role is resolved once into a [`PermissionSet`], which is what every
//! access check runs against.
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::WorkflowError;

/// Organizational areas a document passes through.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, minicbor::Encode, minicbor::Decode,
)]
pub enum Area {
    #[n(0)]
    Sales,
    #[n(1)]
    Purchasing,
    #[n(2)]
    Billing,
    #[n(3)]
    Operations,
}

/// The three areas that receive attachments, in workflow order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, minicbor::Encode, minicbor::Decode,
)]
pub enum StageArea {
    #[n(0)]
    Purchasing,
    #[n(1)]
    Billing,
    #[n(2)]
    Operations,
}

/// Read-only screens guarded per area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum View {
    Tracking,
    Search,
    Reports,
    Audit,
}

impl Area {
    pub const ALL: [Area; 4] = [Area::Sales, Area::Purchasing, Area::Billing, Area::Operations];

    pub fn slug(&self) -> &'static str {
        match self {
            Area::Sales => "sales",
            Area::Purchasing => "purchasing",
            Area::Billing => "billing",
            Area::Operations => "operations",
        }
    }

    pub fn stage(&self) -> Option<StageArea> {
        match self {
            Area::Sales => None,
            Area::Purchasing => Some(StageArea::Purchasing),
            Area::Billing => Some(StageArea::Billing),
            Area::Operations => Some(StageArea::Operations),
        }
    }
}

impl StageArea {
    pub const ALL: [StageArea; 3] = [
        StageArea::Purchasing,
        StageArea::Billing,
        StageArea::Operations,
    ];

    pub fn area(&self) -> Area {
        match self {
            StageArea::Purchasing => Area::Purchasing,
            StageArea::Billing => Area::Billing,
            StageArea::Operations => Area::Operations,
        }
    }
}

impl View {
    pub const ALL: [View; 4] = [View::Tracking, View::Search, View::Reports, View::Audit];

    pub fn slug(&self) -> &'static str {
        match self {
            View::Tracking => "tracking",
            View::Search => "search",
            View::Reports => "reports",
            View::Audit => "audit",
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl fmt::Display for StageArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.area())
    }
}

impl TryFrom<Area> for StageArea {
    type Error = WorkflowError;

    fn try_from(value: Area) -> Result<Self, Self::Error> {
        value.stage().ok_or_else(|| {
            WorkflowError::InvalidInput(format!("area '{value}' does not take attachments"))
        })
    }
}

impl FromStr for Area {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Area::ALL
            .into_iter()
            .find(|a| a.slug() == s)
            .ok_or_else(|| WorkflowError::InvalidInput(format!("unknown area '{s}'")))
    }
}

/// A single capability flag held by a role.
///
/// Sales-only flags (`RegisterDocument`, `DeleteOrder`) and the
/// Operations-only `UpdateDeliveryState` carry no area, the rest are keyed
/// by the area they apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    ManageUsers,
    ManageRoles,
    SeeAllDocuments,
    RegisterDocument,
    DeleteOrder,
    Access(View, Area),
    AdvancedReports(Area),
    Attach(StageArea),
    EditRemoveAttachment(StageArea),
    UpdateDeliveryState,
}

impl Permission {
    /// Every flag, grouped by area the same way [`permission_groups`] lists them.
    pub fn all() -> Vec<Permission> {
        permission_groups()
            .into_iter()
            .flat_map(|g| g.permissions.into_iter().map(|(p, _)| p))
            .collect()
    }

    /// Stable string form used by role configuration.
    pub fn slug(&self) -> String {
        match self {
            Permission::ManageUsers => "manage-users".into(),
            Permission::ManageRoles => "manage-roles".into(),
            Permission::SeeAllDocuments => "see-all-documents".into(),
            Permission::RegisterDocument => "register-document-sales".into(),
            Permission::DeleteOrder => "delete-order-sales".into(),
            Permission::Access(view, area) => format!("access-{}-{}", view.slug(), area.slug()),
            Permission::AdvancedReports(area) => format!("advanced-reports-{}", area.slug()),
            Permission::Attach(area) => format!("attach-document-{area}"),
            Permission::EditRemoveAttachment(area) => format!("edit-remove-attachment-{area}"),
            Permission::UpdateDeliveryState => "update-delivery-state-operations".into(),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.slug())
    }
}

impl FromStr for Permission {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::all()
            .into_iter()
            .find(|p| p.slug() == s)
            .ok_or_else(|| WorkflowError::InvalidInput(format!("unknown permission '{s}'")))
    }
}

/// Resolved permissions of one actor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, permission: &Permission) -> bool {
        self.0.contains(permission)
    }

    pub fn insert(&mut self, permission: Permission) -> bool {
        self.0.insert(permission)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stage areas this set may attach to.
    pub fn attach_areas(&self) -> Vec<StageArea> {
        StageArea::ALL
            .into_iter()
            .filter(|a| self.contains(&Permission::Attach(*a)))
            .collect()
    }

    /// Parse a list of permission slugs, failing on the first unknown one.
    pub fn from_slugs<'a>(slugs: impl IntoIterator<Item = &'a str>) -> Result<Self, WorkflowError> {
        slugs.into_iter().map(Permission::from_str).collect()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Permission> for PermissionSet {
    fn extend<I: IntoIterator<Item = Permission>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: u64,
    pub name: String,
    pub permissions: PermissionSet,
}

impl Role {
    pub fn new(id: u64, name: impl Into<String>, permissions: PermissionSet) -> Self {
        Self {
            id,
            name: name.into(),
            permissions,
        }
    }
}

/// A titled group of flags with a short description for each one.
#[derive(Debug, Clone)]
pub struct PermissionGroup {
    pub name: &'static str,
    pub permissions: Vec<(Permission, &'static str)>,
}

fn area_group(name: &'static str, area: Area) -> PermissionGroup {
    let mut permissions = Vec::new();

    match area.stage() {
        None => permissions.push((Permission::RegisterDocument, "Register document")),
        Some(stage) => permissions.push((Permission::Attach(stage), "Attach document")),
    }
    permissions.push((Permission::Access(View::Tracking, area), "Access tracking"));
    permissions.push((Permission::Access(View::Search, area), "Access search"));
    permissions.push((Permission::Access(View::Reports, area), "Access reports"));
    permissions.push((Permission::Access(View::Audit, area), "Access audit trail"));
    match area.stage() {
        None => permissions.push((Permission::DeleteOrder, "Edit/delete order")),
        Some(stage) => permissions.push((
            Permission::EditRemoveAttachment(stage),
            "Edit/remove attachment",
        )),
    }
    permissions.push((Permission::AdvancedReports(area), "See advanced reports"));
    if area == Area::Operations {
        permissions.push((Permission::UpdateDeliveryState, "Update delivery state"));
    }

    PermissionGroup { name, permissions }
}

pub fn permission_groups() -> Vec<PermissionGroup> {
    vec![
        PermissionGroup {
            name: "Administration",
            permissions: vec![
                (Permission::SeeAllDocuments, "See every user's documents"),
                (Permission::ManageUsers, "Manage users"),
                (Permission::ManageRoles, "Manage roles and permissions"),
            ],
        },
        area_group("Sales", Area::Sales),
        area_group("Purchasing", Area::Purchasing),
        area_group("Billing", Area::Billing),
        area_group("Operations", Area::Operations),
    ]
}

fn stage_views(areas: &[Area], views: &[View]) -> Vec<Permission> {
    areas
        .iter()
        .flat_map(|a| views.iter().map(|v| Permission::Access(*v, *a)))
        .collect()
}

const STAGE_AREAS: [Area; 3] = [Area::Purchasing, Area::Billing, Area::Operations];

/// Built-in roles every fresh directory starts with.
pub fn default_roles() -> Vec<Role> {
    let admin: PermissionSet = Permission::all().into_iter().collect();

    let mut area_supervisor: PermissionSet = [Permission::SeeAllDocuments].into_iter().collect();
    area_supervisor.extend(stage_views(&STAGE_AREAS, &View::ALL));
    for stage in StageArea::ALL {
        area_supervisor.insert(Permission::Attach(stage));
        area_supervisor.insert(Permission::EditRemoveAttachment(stage));
        area_supervisor.insert(Permission::AdvancedReports(stage.area()));
    }
    area_supervisor.insert(Permission::UpdateDeliveryState);

    let mut area_assistant: PermissionSet = stage_views(&STAGE_AREAS, &[View::Tracking, View::Search])
        .into_iter()
        .collect();
    area_assistant.extend(StageArea::ALL.into_iter().map(Permission::Attach));

    let mut sales_supervisor: PermissionSet = [
        Permission::SeeAllDocuments,
        Permission::RegisterDocument,
        Permission::DeleteOrder,
        Permission::AdvancedReports(Area::Sales),
    ]
    .into_iter()
    .collect();
    sales_supervisor.extend(stage_views(&[Area::Sales], &View::ALL));

    let mut sales_assistant: PermissionSet = [Permission::RegisterDocument].into_iter().collect();
    sales_assistant.extend(stage_views(&[Area::Sales], &[View::Tracking, View::Search]));

    vec![
        Role::new(1, "System Administrator", admin),
        Role::new(2, "Area Supervisor", area_supervisor),
        Role::new(3, "Area Assistant", area_assistant),
        Role::new(4, "Sales Supervisor", sales_supervisor),
        Role::new(5, "Sales Assistant", sales_assistant),
    ]
}
