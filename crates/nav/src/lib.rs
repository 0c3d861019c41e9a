//! arbor-nav - 权限感知导航管线
//!
//! 核心流程：权限快照（bundle）→ 菜单过滤 → 路由生成 → 导航校验 → 守卫放行，
//! 重复查询通过注入的 TTL 缓存记忆化

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::filter::{FilterOutcome, FilterStats, MenuFilter};
pub use application::generator::RouteGenerator;
pub use application::guard::{GuardState, RouteGuard};
pub use application::router::{BreadcrumbItem, MenuRouter, NavigationView};
pub use application::validator::{RouteValidator, SubcheckOutcomes, ValidationReport};
pub use domain::bundle::{DataScope, PermissionBundleSource, UserPermissionInfo};
pub use domain::menu::{Button, MenuKind, MenuNode};
pub use domain::permission::{Permission, ResourceType};
pub use domain::resolver::{GrantAllResolver, PermissionResolver};
pub use domain::role::{Role, UserRoleInfo};
pub use domain::route::{RouteConfig, RouteMeta, RouteOrigin};
pub use infrastructure::cache::flight::FlightGroup;
pub use infrastructure::cache::persist::{SNAPSHOT_VERSION, SnapshotPersister};
pub use infrastructure::cache::ttl_cache::{CacheStats, TtlCache, TtlCacheConfig};
