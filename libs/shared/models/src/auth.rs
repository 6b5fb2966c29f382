use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by both access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub email: Option<String>,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated principal placed in request extensions by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: Role,
    pub issued_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn can(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }
}

/// The columns of a `users` row re-read for every authenticated request.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountStatus {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub password_changed_at: Option<DateTime<Utc>>,
}

impl AccountStatus {
    pub const COLUMNS: &'static str = "id,email,role,is_active,password_changed_at";

    /// True when the password changed after a token issued at `issued_at` (unix seconds).
    pub fn changed_password_after(&self, issued_at: i64) -> bool {
        self.password_changed_at
            .map(|changed| issued_at < changed.timestamp())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Doctor,
    #[default]
    Nurse,
    Pharmacist,
    Biller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ManageAppointments,
    ManagePatients,
    DeletePatients,
    ManageUsers,
    ManageDiagnoses,
    ManageMedications,
    DeleteMedications,
    IssuePrescriptions,
    UpdatePrescriptions,
    DispensePrescriptions,
    DeletePrescriptions,
    ManageInvoices,
    DeleteInvoices,
    ViewInvoiceStats,
}

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::ManageAppointments,
    Permission::ManagePatients,
    Permission::DeletePatients,
    Permission::ManageUsers,
    Permission::ManageDiagnoses,
    Permission::ManageMedications,
    Permission::DeleteMedications,
    Permission::IssuePrescriptions,
    Permission::UpdatePrescriptions,
    Permission::DispensePrescriptions,
    Permission::DeletePrescriptions,
    Permission::ManageInvoices,
    Permission::DeleteInvoices,
    Permission::ViewInvoiceStats,
];

const DOCTOR_PERMISSIONS: &[Permission] = &[
    Permission::ManageAppointments,
    Permission::ManagePatients,
    Permission::ManageDiagnoses,
    Permission::ManageMedications,
    Permission::DeleteMedications,
    Permission::IssuePrescriptions,
    Permission::UpdatePrescriptions,
    Permission::ManageInvoices,
    Permission::ViewInvoiceStats,
];

const NURSE_PERMISSIONS: &[Permission] = &[Permission::ManageAppointments];

const PHARMACIST_PERMISSIONS: &[Permission] = &[
    Permission::DeleteMedications,
    Permission::IssuePrescriptions,
    Permission::DispensePrescriptions,
    Permission::ManageInvoices,
];

const BILLER_PERMISSIONS: &[Permission] = &[
    Permission::ManageInvoices,
    Permission::ViewInvoiceStats,
];

impl Role {
    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Role::Admin => ADMIN_PERMISSIONS,
            Role::Doctor => DOCTOR_PERMISSIONS,
            Role::Nurse => NURSE_PERMISSIONS,
            Role::Pharmacist => PHARMACIST_PERMISSIONS,
            Role::Biller => BILLER_PERMISSIONS,
        }
    }

    pub fn has_permission(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Nurse => "nurse",
            Role::Pharmacist => "pharmacist",
            Role::Biller => "biller",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "doctor" => Ok(Role::Doctor),
            "nurse" => Ok(Role::Nurse),
            "pharmacist" => Ok(Role::Pharmacist),
            "biller" => Ok(Role::Biller),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}
