//! Entity module - SeaORM entity definitions for every table the scheduling core owns.
//! Reference data (catalog), the two ledgers (availability, enrollment), bookings and the
//! append-only class history each get their own table.

pub mod availability;
pub mod booking;
pub mod class_metadata;
pub mod package;
pub mod package_bundle;
pub mod package_bundle_item;
pub mod student_enrollment;
pub mod student_profile;
pub mod teacher_package;
pub mod teacher_profile;
pub mod user;

// Re-export specific types to avoid conflicts
pub use availability::{
    Column as AvailabilityColumn, Entity as Availability, Model as AvailabilityModel,
};
pub use booking::{
    BookingStatus, Column as BookingColumn, Entity as Booking, Model as BookingModel,
    PaymentStatus,
};
pub use class_metadata::{
    Column as ClassMetadataColumn, Entity as ClassMetadata, Model as ClassMetadataModel,
};
pub use package::{Column as PackageColumn, Entity as Package, Model as PackageModel};
pub use package_bundle::{
    Column as PackageBundleColumn, Entity as PackageBundle, Model as PackageBundleModel,
};
pub use package_bundle_item::{
    Column as PackageBundleItemColumn, Entity as PackageBundleItem,
    Model as PackageBundleItemModel,
};
pub use student_enrollment::{
    Column as StudentEnrollmentColumn, EnrollmentStatus, Entity as StudentEnrollment,
    Model as StudentEnrollmentModel,
};
pub use student_profile::{
    Column as StudentProfileColumn, Entity as StudentProfile, Model as StudentProfileModel,
};
pub use teacher_package::{
    Column as TeacherPackageColumn, Entity as TeacherPackage, Model as TeacherPackageModel,
};
pub use teacher_profile::{
    Column as TeacherProfileColumn, Entity as TeacherProfile, Model as TeacherProfileModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel, Role};
